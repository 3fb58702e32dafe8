//! Wire shape of the inner contact payload.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

use super::entity::Contact;

#[derive(Debug, thiserror::Error)]
#[error("invalid contact payload: {0}")]
pub struct DtoError(#[from] serde_json::Error);

/// Contact as sent by producers.
///
/// Keys are matched case-insensitively and accept both the Portuguese and the
/// English spelling (`Nome`/`Name`, `Telefone`/`Phone`, `Ddd`/`AreaCode`,
/// `Regiao`/`Region`). Unknown keys, including any client-side timestamp, are
/// ignored. Numeric values are accepted for string fields, so `"Ddd": 11`
/// reads as `"11"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDto {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub area_code: Option<String>,
    pub region: Option<String>,
}

impl ContactDto {
    /// Deserialize the inner payload text.
    ///
    /// `Ok(None)` means the payload was valid JSON `null`, i.e. there is no
    /// usable object to map.
    pub fn from_json(text: &str) -> Result<Option<Self>, DtoError> {
        Ok(serde_json::from_str::<Option<ContactDto>>(text)?)
    }

    /// Map to the persisted entity. A missing name maps to an empty string.
    pub fn into_entity(self, created_at: DateTime<Utc>) -> Contact {
        Contact {
            name: self.name.unwrap_or_default(),
            phone: self.phone,
            email: self.email,
            area_code: self.area_code,
            region: self.region,
            created_at,
        }
    }
}

/// Scalar accepted where the DTO expects text.
#[derive(Deserialize)]
#[serde(untagged)]
enum TextValue {
    Text(String),
    Number(serde_json::Number),
}

impl TextValue {
    fn into_string(self) -> String {
        match self {
            TextValue::Text(s) => s,
            TextValue::Number(n) => n.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for ContactDto {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ContactDtoVisitor)
    }
}

struct ContactDtoVisitor;

impl<'de> Visitor<'de> for ContactDtoVisitor {
    type Value = ContactDto;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a contact object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut dto = ContactDto::default();

        while let Some(key) = map.next_key::<String>()? {
            let slot = match key.to_lowercase().as_str() {
                "nome" | "name" => &mut dto.name,
                "telefone" | "phone" => &mut dto.phone,
                "email" => &mut dto.email,
                "ddd" | "areacode" | "area_code" => &mut dto.area_code,
                "regiao" | "region" => &mut dto.region,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
            };
            let value = map
                .next_value::<Option<TextValue>>()
                .map_err(|_| de::Error::custom(format!("field '{}' must be a string", key)))?;
            *slot = value.map(TextValue::into_string);
        }

        Ok(dto)
    }
}
