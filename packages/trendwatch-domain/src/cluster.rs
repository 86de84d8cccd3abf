//! Density-based clustering (DBSCAN) over a precomputed cosine-distance matrix.

use std::collections::{BTreeMap, VecDeque};

use crate::vector;

/// Cluster id to member indices, ordered by id. Noise points are absent.
pub type Clusters = BTreeMap<usize, Vec<usize>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
	/// Maximum distance for two points to count as neighbors (inclusive).
	pub eps: f32,
	/// Neighborhood size, the point itself included, required for a core point.
	pub min_samples: usize,
}
impl From<&trendwatch_config::Trends> for ClusterParams {
	fn from(cfg: &trendwatch_config::Trends) -> Self {
		Self { eps: cfg.dbscan_eps, min_samples: cfg.dbscan_min_samples as usize }
	}
}

/// Symmetric N×N distance matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
	n: usize,
	values: Vec<f32>,
}
impl DistanceMatrix {
	pub fn cosine<V>(vectors: &[V]) -> Self
	where
		V: AsRef<[f32]>,
	{
		let n = vectors.len();
		let mut values = vec![0.0_f32; n * n];

		for i in 0..n {
			for j in (i + 1)..n {
				let distance = vector::cosine_distance(vectors[i].as_ref(), vectors[j].as_ref());

				values[i * n + j] = distance;
				values[j * n + i] = distance;
			}
		}

		Self { n, values }
	}

	pub fn len(&self) -> usize {
		self.n
	}

	pub fn is_empty(&self) -> bool {
		self.n == 0
	}

	pub fn get(&self, i: usize, j: usize) -> f32 {
		self.values[i * self.n + j]
	}

	fn neighbors(&self, i: usize, eps: f32) -> Vec<usize> {
		(0..self.n).filter(|&j| self.get(i, j) <= eps).collect()
	}
}

/// Labels every point with a cluster id, or `None` for noise.
///
/// Points are scanned in index order and clusters grow breadth-first, so labels are a pure
/// function of the matrix and parameters. A border point reachable from two clusters joins the
/// one discovered first. Clusters left with fewer than `min_samples` members after expansion
/// are demoted to noise.
pub fn dbscan(matrix: &DistanceMatrix, params: ClusterParams) -> Vec<Option<usize>> {
	let n = matrix.len();
	let neighborhoods: Vec<Vec<usize>> = (0..n).map(|i| matrix.neighbors(i, params.eps)).collect();
	let is_core: Vec<bool> =
		neighborhoods.iter().map(|neighbors| neighbors.len() >= params.min_samples).collect();
	let mut labels: Vec<Option<usize>> = vec![None; n];
	let mut next_label = 0_usize;

	for seed in 0..n {
		if labels[seed].is_some() || !is_core[seed] {
			continue;
		}

		let label = next_label;
		let mut members = vec![seed];
		let mut queue = VecDeque::from([seed]);

		labels[seed] = Some(label);

		while let Some(point) = queue.pop_front() {
			if !is_core[point] {
				continue;
			}

			for &neighbor in &neighborhoods[point] {
				if labels[neighbor].is_none() {
					labels[neighbor] = Some(label);
					members.push(neighbor);
					queue.push_back(neighbor);
				}
			}
		}

		if members.len() < params.min_samples {
			for member in members {
				labels[member] = None;
			}

			continue;
		}

		next_label += 1;
	}

	labels
}

/// Groups labeled points by cluster id, dropping noise.
pub fn group_labels(labels: &[Option<usize>]) -> Clusters {
	let mut clusters = Clusters::new();

	for (idx, label) in labels.iter().enumerate() {
		if let Some(label) = label {
			clusters.entry(*label).or_default().push(idx);
		}
	}

	clusters
}

pub fn cluster_embeddings<V>(vectors: &[V], params: ClusterParams) -> Clusters
where
	V: AsRef<[f32]>,
{
	let matrix = DistanceMatrix::cosine(vectors);
	let labels = dbscan(&matrix, params);

	group_labels(&labels)
}
