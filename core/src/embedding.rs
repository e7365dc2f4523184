use sha2::{Digest, Sha256};

/// Deterministic, hash-seeded embedding used by the mock Embedder variant.
/// Identical `(text, model_id, dims)` always produce a bit-identical,
/// L2-normalized vector.
pub fn deterministic_embedding(text: &str, model_id: &str, dims: usize) -> Vec<f32> {
    let dims = dims.max(1);

    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut out = Vec::with_capacity(dims);
    for i in 0..dims {
        let byte = digest[i % digest.len()];
        let value = (byte as f32 / 127.5) - 1.0;
        out.push(value);
    }

    l2_normalize(&mut out);
    out
}

/// Normalizes `vec` in place to unit L2 norm. A zero vector is left as-is.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedding_is_reproducible_for_same_inputs() {
        let a = deterministic_embedding("hello", "embedding-default-v1", 8);
        let b = deterministic_embedding("hello", "embedding-default-v1", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn deterministic_embedding_changes_when_model_changes() {
        let a = deterministic_embedding("hello", "embedding-default-v1", 8);
        let b = deterministic_embedding("hello", "embedding-alt-v1", 8);
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_embedding_is_unit_norm() {
        let v = deterministic_embedding("hello world", "embedding-default-v1", 16);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
