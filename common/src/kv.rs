use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Unidad de datos intermedios y finales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Orden total sobre claves: lexicográfico por bytes.
/// Lo usan el reduce y el merge final, así que no depende de cómo se guarden los registros.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Ordena por clave manteniendo el orden de llegada dentro de cada clave (sort estable).
pub fn sort_by_key(records: &mut [KeyValue]) {
    records.sort_by(|a, b| compare_keys(&a.key, &b.key));
}

/// Agrupa un slice ya ordenado en (clave, valores) consecutivos.
pub fn group_sorted(records: &[KeyValue]) -> Vec<(&str, Vec<String>)> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();

    for kv in records {
        match groups.last_mut() {
            Some((key, values)) if *key == kv.key.as_str() => values.push(kv.value.clone()),
            _ => groups.push((kv.key.as_str(), vec![kv.value.clone()])),
        }
    }

    groups
}
