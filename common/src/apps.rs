//! Aplicaciones de ejemplo que los workers saben ejecutar.

use std::collections::BTreeSet;

use crate::kv::KeyValue;

pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;
pub type ReduceFn = fn(&str, &[String]) -> String;

/// Par de funciones map/reduce de una aplicación.
#[derive(Clone, Copy)]
pub struct App {
    pub name: &'static str,
    pub map_f: MapFn,
    pub reduce_f: ReduceFn,
}

/// Busca una aplicación por nombre ("wordcount", "indexer").
pub fn app_by_name(name: &str) -> Option<App> {
    match name {
        "wordcount" | "wc" => Some(App {
            name: "wordcount",
            map_f: wordcount_map,
            reduce_f: wordcount_reduce,
        }),
        "indexer" | "ii" => Some(App {
            name: "indexer",
            map_f: indexer_map,
            reduce_f: indexer_reduce,
        }),
        _ => None,
    }
}

/// limpiar: solo alfanumérico y '_', en minúscula
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        (!cleaned.is_empty()).then_some(cleaned)
    })
}

/// WordCount: un registro (palabra, "1") por ocurrencia.
pub fn wordcount_map(_file: &str, contents: &str) -> Vec<KeyValue> {
    tokenize(contents).map(|w| KeyValue::new(w, "1")).collect()
}

/// WordCount: suma los conteos. Valores no numéricos cuentan como 0.
pub fn wordcount_reduce(_key: &str, values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim().parse::<u64>().unwrap_or(0))
        .sum::<u64>()
        .to_string()
}

/// Índice invertido: (palabra, documento), una vez por documento.
pub fn indexer_map(file: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<String> = tokenize(contents).collect();
    words.into_iter().map(|w| KeyValue::new(w, file)).collect()
}

/// Índice invertido: "<cantidad> <doc1>,<doc2>,..." con documentos ordenados y sin repetir.
pub fn indexer_reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let docs: Vec<&str> = docs.into_iter().collect();
    format!("{} {}", docs.len(), docs.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wordcount_map_normaliza_tokens() {
        let out = wordcount_map("f", "Hola hola, MUNDO!  mundo_prueba");
        let keys: Vec<&str> = out.iter().map(|kv| kv.key.as_str()).collect();

        assert_eq!(keys, vec!["hola", "hola", "mundo", "mundo_prueba"]);
        assert!(out.iter().all(|kv| kv.value == "1"));
    }

    #[test]
    fn wordcount_reduce_suma() {
        let vs = vec!["1".to_string(), "2".to_string(), "x".to_string()];
        assert_eq!(wordcount_reduce("k", &vs), "3");
    }

    #[test]
    fn indexer_emite_una_vez_por_documento() {
        let out = indexer_map("doc1", "a b a");
        assert_eq!(out, vec![KeyValue::new("a", "doc1"), KeyValue::new("b", "doc1")]);

        let vs = vec!["d2".to_string(), "d1".to_string(), "d2".to_string()];
        assert_eq!(indexer_reduce("a", &vs), "2 d1,d2");
    }

    #[test]
    fn app_by_name_conoce_las_apps() {
        assert_eq!(app_by_name("wordcount").unwrap().name, "wordcount");
        assert_eq!(app_by_name("ii").unwrap().name, "indexer");
        assert!(app_by_name("nada").is_none());
    }
}
