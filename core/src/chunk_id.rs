use uuid::Uuid;

/// Deterministic chunk identifier: a name-based (v5, URL namespace) UUID
/// derived from the absolute document path and the chunk's ordinal.
/// Re-ingesting the same file reproduces the same ids, so storage upserts
/// overwrite rather than duplicate.
pub fn chunk_id(file_path: &str, index: usize) -> Uuid {
    let name = format!("{}-{}", file_path, index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let a = chunk_id("/data/report.pdf", 0);
        let b = chunk_id("/data/report.pdf", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_varies_by_index() {
        let a = chunk_id("/data/report.pdf", 0);
        let b = chunk_id("/data/report.pdf", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_varies_by_path() {
        let a = chunk_id("/data/a.pdf", 0);
        let b = chunk_id("/data/b.pdf", 0);
        assert_ne!(a, b);
    }
}
