//! Brute-force flat L2 vector index.
//!
//! Holds chunk ids and their embeddings in parallel arrays (vectors are
//! stored flattened, `dim` floats per entry) and answers k-nearest-neighbour
//! queries by scanning every entry. Exact, not approximate: the corpora are
//! thousands of lecture chunks, not millions.
//!
//! The index is runtime-only. The application rebuilds it from stored
//! chunk rows at startup and after a document is replaced or deleted.
//!
//! # Example
//!
//! ```rust
//! use lecture_rag_core::index::FlatL2Index;
//!
//! let mut index = FlatL2Index::new();
//! index.add(10, vec![0.0, 0.0]).unwrap();
//! index.add(11, vec![3.0, 4.0]).unwrap();
//! let hits = index.search(&[2.5, 4.0], 1).unwrap();
//! assert_eq!(hits[0].id, 11);
//! assert_eq!(hits[0].distance, 0.25);
//! ```

use std::cmp::Ordering;

use crate::embedding::squared_l2;
use crate::error::{RagError, RagResult};

/// One search result: a chunk id and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    dim: Option<usize>,
    ids: Vec<i64>,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Established dimension, or `None` while the index has never held a vector.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Replace the whole index. The dimension is taken from the first vector.
    ///
    /// On error the previous contents are left untouched.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if any vector differs in length from
    /// the first one, or if the first one is empty.
    pub fn build<I>(&mut self, entries: I) -> RagResult<()>
    where
        I: IntoIterator<Item = (i64, Vec<f32>)>,
    {
        let mut dim = None;
        let mut ids = Vec::new();
        let mut data = Vec::new();

        for (id, vector) in entries {
            let expected = *dim.get_or_insert(vector.len());
            if expected == 0 || vector.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            ids.push(id);
            data.extend_from_slice(&vector);
        }

        // An empty build keeps no dimension; the next add establishes one.
        self.dim = dim;
        self.ids = ids;
        self.data = data;
        Ok(())
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if `vector` does not match the
    /// established dimension (or is empty).
    pub fn add(&mut self, id: i64, vector: Vec<f32>) -> RagResult<()> {
        let expected = self.dim.unwrap_or(vector.len());
        if expected == 0 || vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        self.dim = Some(expected);
        self.ids.push(id);
        self.data.extend_from_slice(&vector);
        Ok(())
    }

    /// Check that `vectors` could be appended, without changing anything.
    /// Returns the dimension the index would have afterwards; `None` only
    /// for an empty batch on a dimensionless index.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if any vector disagrees with the
    /// established dimension (or with the first vector, on an empty index).
    pub fn check_dims<'a, I>(&self, vectors: I) -> RagResult<Option<usize>>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut expected = self.dim;
        for vector in vectors {
            let dim = *expected.get_or_insert(vector.len());
            if dim == 0 || vector.len() != dim {
                return Err(RagError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
        }
        Ok(expected)
    }

    /// Append several entries at once. Either all are added or none are.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if any vector disagrees with the
    /// established dimension (or with the first vector, on an empty index).
    pub fn extend<I>(&mut self, entries: I) -> RagResult<()>
    where
        I: IntoIterator<Item = (i64, Vec<f32>)>,
    {
        let entries: Vec<(i64, Vec<f32>)> = entries.into_iter().collect();
        let Some(expected) = self.check_dims(entries.iter().map(|(_, v)| v.as_slice()))? else {
            return Ok(());
        };

        self.dim = Some(expected);
        for (id, vector) in entries {
            self.ids.push(id);
            self.data.extend_from_slice(&vector);
        }
        Ok(())
    }

    /// The `top_k` nearest entries by squared L2 distance, closest first.
    /// Equal distances keep insertion order.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if nothing has been indexed.
    /// - [`RagError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], top_k: usize) -> RagResult<Vec<SearchHit>> {
        let dim = match self.dim {
            Some(dim) if !self.ids.is_empty() => dim,
            _ => return Err(RagError::EmptyIndex),
        };
        if query.len() != dim {
            return Err(RagError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dim)
            .map(|vector| squared_l2(query, vector))
            .enumerate()
            .collect();

        let by_distance = |a: &(usize, f32), b: &(usize, f32)| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        };

        let k = top_k.min(hits.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance);
            hits.truncate(k);
        }
        hits.sort_by(by_distance);

        Ok(hits
            .into_iter()
            .map(|(pos, distance)| SearchHit {
                id: self.ids[pos],
                distance,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FlatL2Index {
        let mut index = FlatL2Index::new();
        index
            .build(vec![
                (1, vec![0.0, 0.0]),
                (2, vec![1.0, 0.0]),
                (3, vec![0.0, 2.0]),
                (4, vec![5.0, 5.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_search_empty_index() {
        let index = FlatL2Index::new();
        assert_eq!(index.search(&[1.0], 3), Err(RagError::EmptyIndex));

        let mut built_empty = FlatL2Index::new();
        built_empty.build(Vec::new()).unwrap();
        assert_eq!(built_empty.search(&[1.0], 3), Err(RagError::EmptyIndex));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert!((hits[0].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_search_count_bounds() {
        let index = sample();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 4);
        assert_eq!(index.search(&[0.0, 0.0], 2).unwrap().len(), 2);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = FlatL2Index::new();
        for id in [7, 3, 9, 1] {
            index.add(id, vec![1.0, 1.0]).unwrap();
        }
        let ids: Vec<i64> = index
            .search(&[1.0, 1.0], 3)
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![7, 3, 9]);
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_index_intact() {
        let mut index = sample();
        let err = index.add(5, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(index.len(), 4);
        assert_eq!(index.ids(), &[1, 2, 3, 4]);
        assert_eq!(index.search(&[5.0, 5.0], 1).unwrap()[0].id, 4);
    }

    #[test]
    fn test_add_empty_vector_rejected() {
        let mut index = FlatL2Index::new();
        assert!(matches!(
            index.add(1, Vec::new()),
            Err(RagError::DimensionMismatch { .. })
        ));
        assert_eq!(index.dim(), None);
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut index = sample();
        let err = index
            .extend(vec![(5, vec![1.0, 1.0]), (6, vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
        assert_eq!(index.len(), 4);

        index.extend(vec![(5, vec![1.0, 1.0]), (6, vec![2.0, 2.0])]).unwrap();
        assert_eq!(index.ids(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_check_dims() {
        let index = sample();
        let ok: [&[f32]; 2] = [&[1.0, 1.0], &[0.0, 2.0]];
        assert_eq!(index.check_dims(ok), Ok(Some(2)));

        let bad: [&[f32]; 1] = [&[1.0, 1.0, 1.0]];
        assert_eq!(
            index.check_dims(bad),
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(index.len(), 4);

        let empty = FlatL2Index::new();
        assert_eq!(empty.check_dims(Vec::<&[f32]>::new()), Ok(None));
        let mixed: [&[f32]; 2] = [&[1.0], &[1.0, 2.0]];
        assert!(empty.check_dims(mixed).is_err());
    }

    #[test]
    fn test_build_mismatch_keeps_previous_contents() {
        let mut index = sample();
        let err = index
            .build(vec![(10, vec![1.0, 1.0, 1.0]), (11, vec![1.0, 1.0])])
            .unwrap_err();
        assert_eq!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), Some(2));
    }

    #[test]
    fn test_build_replaces_dimension() {
        let mut index = sample();
        index.build(vec![(20, vec![1.0, 2.0, 3.0])]).unwrap();
        assert_eq!(index.dim(), Some(3));
        assert_eq!(index.len(), 1);
        assert!(index.add(21, vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample();
        assert!(matches!(
            index.search(&[1.0, 2.0, 3.0], 1),
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
