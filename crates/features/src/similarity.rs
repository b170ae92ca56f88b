//! String and vector similarity measures.

/// Levenshtein edit distance, counted in chars.
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    strsim::levenshtein(s1, s2)
}

/// Similarity ratio on a 0-100 scale.
///
/// One minus the normalized insertion/deletion distance, rounded.
/// Returns 0 when either side is empty.
pub fn ratio(s1: &str, s2: &str) -> u8 {
    if s1.is_empty() || s2.is_empty() {
        return 0;
    }
    to_percent(rapidfuzz::fuzz::ratio(s1.chars(), s2.chars()))
}

/// Best `ratio` of the shorter string against every equally long window
/// of the longer one.
pub fn partial_ratio(s1: &str, s2: &str) -> u8 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    if short.is_empty() {
        return 0;
    }

    let mut best = 0;
    for window in long.windows(short.len()) {
        let score = to_percent(rapidfuzz::fuzz::ratio(
            short.iter().copied(),
            window.iter().copied(),
        ));
        best = best.max(score);
        if best == 100 {
            break;
        }
    }
    best
}

fn to_percent(score: f64) -> u8 {
    score.round().clamp(0.0, 100.0) as u8
}

/// Cosine similarity in [-1, 1]; 0.0 for zero vectors or mismatched dimensions.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("acme", "acme"), 0);
        assert_eq!(edit_distance("acme", "acmme"), 1);
        assert_eq!(edit_distance("acme", "akme"), 1);
        assert_eq!(edit_distance("acme", "akkme"), 2);
        assert_eq!(edit_distance("nike", "adidas"), 5);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("colorgrip", "colorgrip"), 100);
        assert_eq!(ratio("acme", "acmme"), 89);
        assert_eq!(ratio("kitten", "sitting"), 62);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", "abc"), 0);
        assert_eq!(ratio("", ""), 0);
    }

    #[test]
    fn test_ratio_symmetric() {
        let pairs = [("colorgrip", "color grip"), ("nike", "nyke"), ("kitten", "sitting")];
        for (a, b) in pairs {
            assert_eq!(ratio(a, b), ratio(b, a));
        }
    }

    #[test]
    fn test_partial_ratio() {
        assert_eq!(partial_ratio("grip", "colorgrip"), 100);
        assert_eq!(partial_ratio("colorgrip", "grip"), 100);
        assert_eq!(partial_ratio("", "grip"), 0);
        assert!(partial_ratio("grap", "colorgrip") >= 75);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
