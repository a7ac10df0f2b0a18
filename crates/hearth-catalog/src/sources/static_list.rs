use crate::entry::{CatalogEntry, CatalogSource};
use crate::size::parse_size_str;

/// id, description, download size, approximate downloads
const MODELS: &[(&str, &str, &str, u64)] = &[
    ("llama3.2:1b", "Meta's Llama 3.2 goes small with 1B parameters", "1.3 GB", 20_000_000),
    ("llama3.2:3b", "Meta's Llama 3.2, 3B parameters", "2.0 GB", 20_000_000),
    ("llama3.1:8b", "Llama 3.1 8B from Meta", "4.9 GB", 95_000_000),
    ("mistral:7b", "The 7B model released by Mistral AI", "4.1 GB", 15_000_000),
    ("gemma2:2b", "Google Gemma 2, 2B parameters", "1.6 GB", 8_000_000),
    ("gemma2:9b", "Google Gemma 2, 9B parameters", "5.4 GB", 8_000_000),
    ("qwen2.5:0.5b", "Qwen2.5 from Alibaba, 0.5B parameters", "398 MB", 10_000_000),
    ("qwen2.5:7b", "Qwen2.5 from Alibaba, 7B parameters", "4.7 GB", 10_000_000),
    ("phi3:mini", "Phi-3 Mini, a lightweight 3.8B model from Microsoft", "2.2 GB", 12_000_000),
    ("deepseek-r1:1.5b", "DeepSeek-R1 reasoning model distilled to 1.5B", "1.1 GB", 50_000_000),
    ("deepseek-r1:7b", "DeepSeek-R1 reasoning model distilled to 7B", "4.7 GB", 50_000_000),
    ("codellama:7b", "A large language model for generating and discussing code", "3.8 GB", 3_000_000),
    ("nomic-embed-text", "A high-performing open embedding model", "274 MB", 30_000_000),
    ("llava:7b", "Multimodal model combining a vision encoder and Vicuna", "4.7 GB", 6_000_000),
    ("tinyllama", "A compact 1.1B Llama model trained on 3 trillion tokens", "638 MB", 2_000_000),
    ("smollm2:135m", "SmolLM2, a family of compact language models", "271 MB", 1_000_000),
];

/// The bundled catalog, served when no network tier and no snapshot is available.
pub fn static_catalog() -> Vec<CatalogEntry> {
    MODELS
        .iter()
        .map(|&(id, description, size, downloads)| CatalogEntry {
            id: id.to_string(),
            description: description.to_string(),
            size_bytes: parse_size_str(size),
            likes: 0,
            downloads,
            works_locally: true,
            source: CatalogSource::Static,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_static_catalog() {
        let entries = static_catalog();
        assert!(entries.len() >= 10);
        assert!(entries.iter().all(|e| e.source == CatalogSource::Static));
        assert!(entries.iter().all(|e| e.size_bytes.is_some()));

        let ids: HashSet<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
        assert!(ids.contains("llama3.2:1b"));
    }
}
