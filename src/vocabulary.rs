use rustc_hash::FxHashMap;

/// Frozen token table with bidirectional lookup. Built once from a container
/// section; never mutated afterwards.
#[derive(Debug, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl Vocabulary {
    /// Duplicate tokens keep their first id, matching converter output where
    /// later occurrences are padding artifacts.
    pub fn new(tokens: Vec<String>) -> Self {
        let mut index = FxHashMap::default();
        for (id, token) in tokens.iter().enumerate() {
            index.entry(token.clone()).or_insert(id as u32);
        }
        Self { tokens, index }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}
