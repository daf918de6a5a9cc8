//! Opaque identifier generation for jobs, articles, and tasks.

use rand::Rng;

const HEX: &[u8; 16] = b"0123456789abcdef";
const SUFFIX_LEN: usize = 12;

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

pub fn job_id() -> String {
    format!("job_{}", random_suffix())
}

pub fn article_id() -> String {
    format!("art_{}", random_suffix())
}

pub fn task_id() -> String {
    format!("task_{}", random_suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_length() {
        let id = job_id();
        assert!(id.starts_with("job_"));
        assert_eq!(id.len(), "job_".len() + SUFFIX_LEN);
        assert!(article_id().starts_with("art_"));
        assert!(task_id().starts_with("task_"));
    }

    #[test]
    fn ids_are_distinct() {
        let a = article_id();
        let b = article_id();
        assert_ne!(a, b);
    }
}
