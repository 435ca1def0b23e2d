//! Local feature-hashing embedder used when the embedding service is unavailable.
//!
//! Vectors are deterministic for a given text and dimension, so records written in degraded mode
//! stay comparable with each other and with fallback query vectors.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const FALLBACK_MODEL: &str = "hashed-v1";

pub fn fallback_version(dim: u32) -> String {
	format!("fallback:{FALLBACK_MODEL}:{dim}")
}

pub fn hashed_embedding(text: &str, dim: u32) -> Vec<f32> {
	let dim = dim.max(1) as usize;
	let normalized = text.nfkc().collect::<String>().to_lowercase();
	let mut vec = vec![0.0_f32; dim];
	let mut words = normalized.unicode_words().peekable();

	if words.peek().is_none() {
		add_feature(&mut vec, normalized.trim());
	}

	let mut previous: Option<&str> = None;

	for word in words {
		add_feature(&mut vec, word);

		if let Some(prev) = previous {
			add_feature(&mut vec, &format!("{prev} {word}"));
		}

		previous = Some(word);
	}

	let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vec {
			*value /= norm;
		}
	}

	vec
}

fn add_feature(vec: &mut [f32], feature: &str) {
	let hash = blake3::hash(feature.as_bytes());
	let bytes = hash.as_bytes();
	let mut bucket = [0_u8; 8];

	bucket.copy_from_slice(&bytes[..8]);

	let idx = (u64::from_le_bytes(bucket) % vec.len() as u64) as usize;
	let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

	vec[idx] += sign;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cosine(a: &[f32], b: &[f32]) -> f32 {
		a.iter().zip(b).map(|(x, y)| x * y).sum()
	}

	#[test]
	fn is_deterministic_and_unit_length() {
		let a = hashed_embedding("List all users", 64);
		let b = hashed_embedding("List all users", 64);
		let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();

		assert_eq!(a, b);
		assert_eq!(a.len(), 64);
		assert!((norm - 1.0).abs() < 1e-5);
	}

	#[test]
	fn normalizes_case_and_width() {
		assert_eq!(hashed_embedding("SELECT Users", 32), hashed_embedding("ｓｅｌｅｃｔ users", 32));
	}

	#[test]
	fn overlapping_texts_are_closer() {
		let query = hashed_embedding("list all users", 256);
		let near = hashed_embedding("list users and their names", 256);
		let far = hashed_embedding("monthly revenue by region", 256);

		assert!(cosine(&query, &near) > cosine(&query, &far));
	}

	#[test]
	fn empty_text_still_has_a_direction() {
		let vec = hashed_embedding("", 16);

		assert!(vec.iter().any(|v| *v != 0.0));
		assert_eq!(fallback_version(16), "fallback:hashed-v1:16");
	}
}
