//! Exact nearest-neighbour index over a snapshot's vectors.
//!
//! A brute-force scan under squared Euclidean distance. Vectors produced by
//! [`crate::model::ModelState::embed`] are unit length, so distance and
//! cosine rank identically and [`similarity_from_distance`] converts back.

/// One query hit: the position of the vector passed to [`FlatIndex::build`]
/// and its squared Euclidean distance from the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build over `vectors`. The first vector fixes the dimension.
    pub fn build(vectors: Vec<Vec<f32>>) -> Self {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        Self { dimension, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The `k` nearest stored vectors, ordered by `(distance, position)`.
    ///
    /// Stored vectors with zero norm or the wrong dimension never match.
    /// A zero-norm or mismatched query returns nothing.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if k == 0 || query.len() != self.dimension || is_zero(query) {
            return Vec::new();
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| v.len() == self.dimension && !is_zero(v))
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        hits
    }
}

/// Cosine similarity of two unit vectors at squared distance `distance`.
pub fn similarity_from_distance(distance: f32) -> f64 {
    (1.0 - f64::from(distance) / 2.0).clamp(0.0, 1.0)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
