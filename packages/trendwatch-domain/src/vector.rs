//! Dense vector math shared by clustering, scoring, and similarity search.

use std::{fmt, str::FromStr};

/// Distance used to rank nearest neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
	#[default]
	Cosine,
	Euclidean,
}
impl Metric {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cosine => "cosine",
			Self::Euclidean => "euclidean",
		}
	}

	pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
		match self {
			Self::Cosine => cosine_distance(a, b),
			Self::Euclidean => euclidean_distance(a, b),
		}
	}
}
impl FromStr for Metric {
	type Err = UnknownMetric;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"cosine" => Ok(Self::Cosine),
			"euclidean" | "l2" => Ok(Self::Euclidean),
			_ => Err(UnknownMetric(raw.to_string())),
		}
	}
}
impl fmt::Display for Metric {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetric(pub String);
impl fmt::Display for UnknownMetric {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown distance metric {:?}; expected cosine, euclidean, or l2.", self.0)
	}
}
impl std::error::Error for UnknownMetric {}

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
	a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

pub fn l2_norm(v: &[f32]) -> f64 {
	dot(v, v).sqrt()
}

/// `1 - cos(a, b)`, in `[0, 2]`.
///
/// A zero vector has no direction and is treated as orthogonal to everything, so its distance is
/// `1.0`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let denom = l2_norm(a) * l2_norm(b);

	if denom == 0.0 {
		return 1.0;
	}

	let similarity = (dot(a, b) / denom).clamp(-1.0, 1.0);

	(1.0 - similarity) as f32
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
	a.iter()
		.zip(b)
		.map(|(x, y)| {
			let diff = f64::from(*x) - f64::from(*y);

			diff * diff
		})
		.sum::<f64>()
		.sqrt() as f32
}

/// Arithmetic mean of the given vectors. `None` when empty or dimensions disagree.
pub fn centroid<'a, I>(vectors: I) -> Option<Vec<f32>>
where
	I: IntoIterator<Item = &'a [f32]>,
{
	let mut iter = vectors.into_iter();
	let first = iter.next()?;
	let mut sum: Vec<f64> = first.iter().map(|v| f64::from(*v)).collect();
	let mut count = 1_usize;

	for vec in iter {
		if vec.len() != sum.len() {
			return None;
		}

		for (acc, value) in sum.iter_mut().zip(vec) {
			*acc += f64::from(*value);
		}

		count += 1;
	}

	Some(sum.into_iter().map(|acc| (acc / count as f64) as f32).collect())
}

pub fn round4(value: f64) -> f64 {
	(value * 10_000.0).round() / 10_000.0
}
