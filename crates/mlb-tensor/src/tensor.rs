use crate::data::TensorData;
use crate::dtype::Dtype;
use crate::error::{Result, TensorError};
use crate::shape::{infer_shape, Shape};
use crate::storage::Storage;

/// A contiguous span into a tensor's backing storage, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSpan {
    pub offset: usize,
    pub len: usize,
}

/// One level of a tensor's nested view tree.
///
/// Branches hold the children of one dimension index; leaves are non-owning
/// spans into the shared backing storage, resolved to slices on access. The
/// innermost two dimensions are flattened: the second-to-last dimension's
/// children are leaf rows directly, with no extra wrapping level.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Vec<Node>),
    Leaf(ViewSpan),
}

impl Node {
    /// Child nodes of a branch; empty for a leaf.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Branch(children) => children,
            Node::Leaf(_) => &[],
        }
    }

    /// The storage span of a leaf, if this node is one.
    pub fn span(&self) -> Option<ViewSpan> {
        match self {
            Node::Branch(_) => None,
            Node::Leaf(span) => Some(*span),
        }
    }

    fn collect_leaves(&self, out: &mut Vec<ViewSpan>) {
        match self {
            Node::Leaf(span) => out.push(*span),
            Node::Branch(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

/// A dtype-tagged, shaped, nested view structure over one flat backing store.
///
/// The tensor exclusively owns its storage; the view tree only records
/// element spans into it. Mutation happens during construction only — `cast`
/// allocates a new tensor and leaves the original unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
    tree: Node,
}

impl Tensor {
    /// Build a tensor from a construction source.
    ///
    /// Four source forms are accepted:
    /// 1. a scalar, producing a length-1 tensor;
    /// 2. a flat binary or typed buffer, bulk-copied (converting
    ///    representations where they differ);
    /// 3. a flat numeric sequence, validated element by element;
    /// 4. a nested structure, filled depth-first into a single allocation
    ///    sized by shape inference.
    pub fn new(data: &TensorData, dtype: Dtype) -> Result<Tensor> {
        match data {
            TensorData::Scalar(v) => {
                if !v.is_finite() {
                    return Err(TensorError::NonFiniteElement);
                }
                let mut storage = Storage::zeros(dtype, 1);
                storage.set(0, *v);
                Ok(Tensor {
                    storage,
                    shape: Shape::new(vec![1]),
                    tree: Node::Leaf(ViewSpan { offset: 0, len: 1 }),
                })
            }
            TensorData::Buffer(buffer) => Tensor::from_buffer(buffer, dtype),
            TensorData::Numbers(values) => Tensor::from_numbers(values, dtype),
            TensorData::Nested(children) => {
                let shape = infer_shape(data, dtype)?;
                if shape.ndim() == 1 {
                    // A one-level nesting of scalars is just a flat sequence.
                    let mut values = Vec::with_capacity(children.len());
                    for child in children {
                        match child {
                            TensorData::Scalar(v) => values.push(*v),
                            _ => return Err(TensorError::InvalidLeaf),
                        }
                    }
                    return Tensor::from_numbers(&values, dtype);
                }

                let mut storage = Storage::zeros(dtype, shape.numel());
                let mut root = Vec::new();
                let mut cursor = 0usize;
                fill(&mut storage, &shape, &mut root, data, 0, &mut cursor)?;
                debug_assert_eq!(cursor, shape.numel());

                Ok(Tensor {
                    storage,
                    shape,
                    tree: Node::Branch(root),
                })
            }
        }
    }

    fn from_numbers(values: &[f64], dtype: Dtype) -> Result<Tensor> {
        let mut storage = Storage::zeros(dtype, values.len());
        for (offset, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(TensorError::NonFiniteElement);
            }
            storage.set(offset, v);
        }
        Ok(Tensor {
            tree: Node::Leaf(ViewSpan {
                offset: 0,
                len: values.len(),
            }),
            shape: Shape::new(vec![values.len()]),
            storage,
        })
    }

    fn from_buffer(buffer: &crate::data::BufferData, dtype: Dtype) -> Result<Tensor> {
        let n = buffer.element_count(dtype)?;
        let mut storage = Storage::zeros(dtype, n);
        storage.copy_from(buffer, 0)?;
        Ok(Tensor {
            tree: Node::Leaf(ViewSpan { offset: 0, len: n }),
            shape: Shape::new(vec![n]),
            storage,
        })
    }

    /// Rebuild the nested view tree over already-populated storage.
    ///
    /// This is the decode-side counterpart of the nested fill: the tree is a
    /// pure function of the shape, so no source structure is needed.
    ///
    /// # Errors
    /// Returns an error if the storage length does not equal the shape's
    /// element count.
    pub fn from_storage(storage: Storage, shape: Shape) -> Result<Tensor> {
        if storage.len() != shape.numel() {
            return Err(TensorError::LengthMismatch {
                len: storage.len(),
                shape: shape.dims().to_vec(),
                numel: shape.numel(),
            });
        }
        let tree = build_tree(&shape);
        Ok(Tensor {
            storage,
            shape,
            tree,
        })
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's element kind.
    pub fn dtype(&self) -> Dtype {
        self.storage.dtype()
    }

    /// Returns the flat backing storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the root of the nested view tree.
    pub fn root(&self) -> &Node {
        &self.tree
    }

    /// All leaf spans in depth-first order.
    pub fn leaf_spans(&self) -> Vec<ViewSpan> {
        let mut out = Vec::new();
        self.tree.collect_leaves(&mut out);
        out
    }

    /// Reads one element by its full multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Result<f64> {
        if index.len() != self.shape.ndim() {
            return Err(self.index_error(index));
        }
        let strides = self.shape.strides();
        let mut flat = 0usize;
        for (axis, &i) in index.iter().enumerate() {
            if i >= self.shape.dim(axis) {
                return Err(self.index_error(index));
            }
            flat += i * strides[axis];
        }
        Ok(self.storage.get(flat))
    }

    /// Decoded values of one leaf row.
    pub fn leaf_values(&self, span: ViewSpan) -> Vec<f64> {
        (span.offset..span.offset + span.len)
            .map(|i| self.storage.get(i))
            .collect()
    }

    /// Element-wise conversion into a newly allocated tensor of `dtype`.
    /// The view tree is preserved; the original tensor is unchanged.
    pub fn cast(&self, dtype: Dtype) -> Tensor {
        Tensor {
            storage: self.storage.cast(dtype),
            shape: self.shape.clone(),
            tree: self.tree.clone(),
        }
    }

    fn index_error(&self, index: &[usize]) -> TensorError {
        TensorError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: self.shape.dims().to_vec(),
        }
    }
}

/// Depth-first nested fill.
///
/// Walks the source structure dimension by dimension, appending view nodes to
/// `container` and advancing `cursor` through the flat storage by exactly one
/// leaf extent per leaf visited. At the second-to-last dimension the
/// recursion stays in the caller's container, flattening the innermost plane
/// into a list of leaf rows.
fn fill(
    storage: &mut Storage,
    shape: &Shape,
    container: &mut Vec<Node>,
    source: &TensorData,
    dim: usize,
    cursor: &mut usize,
) -> Result<()> {
    let len = shape.dim(dim);
    let last = dim == shape.ndim() - 1;
    let pre_last = dim + 2 == shape.ndim();

    if last {
        let span = ViewSpan {
            offset: *cursor,
            len,
        };
        container.push(Node::Leaf(span));

        match source {
            TensorData::Numbers(values) => {
                for o in 0..len {
                    let v = values.get(o).copied().ok_or(TensorError::NonFiniteElement)?;
                    if !v.is_finite() {
                        return Err(TensorError::NonFiniteElement);
                    }
                    storage.set(*cursor + o, v);
                }
                *cursor += len;
            }
            TensorData::Buffer(buffer) => {
                storage.copy_from(buffer, *cursor)?;
                // Advance by the leaf's declared extent, not the buffer's
                // element count (ragged buffers are a known inconsistency).
                *cursor += len;
            }
            _ => return Err(TensorError::InvalidLeaf),
        }
        return Ok(());
    }

    let children = match source {
        TensorData::Nested(children) => children,
        _ => return Err(TensorError::InvalidDimension),
    };

    for o in 0..len {
        let child = children.get(o).ok_or(TensorError::InvalidDimension)?;
        if pre_last {
            fill(storage, shape, container, child, dim + 1, cursor)?;
        } else {
            let mut sub = Vec::new();
            fill(storage, shape, &mut sub, child, dim + 1, cursor)?;
            container.push(Node::Branch(sub));
        }
    }
    Ok(())
}

/// Builds the view tree for a shape over already-populated storage.
///
/// Mirrors the fill's flattening of the last two dimensions, reading offsets
/// instead of writing values.
fn build_tree(shape: &Shape) -> Node {
    if shape.ndim() <= 1 {
        return Node::Leaf(ViewSpan {
            offset: 0,
            len: shape.numel(),
        });
    }
    let mut root = Vec::new();
    let mut cursor = 0usize;
    build_branch(shape, 0, &mut root, &mut cursor);
    Node::Branch(root)
}

fn build_branch(shape: &Shape, dim: usize, container: &mut Vec<Node>, cursor: &mut usize) {
    let len = shape.dim(dim);
    let last = dim == shape.ndim() - 1;
    let pre_last = dim + 2 == shape.ndim();

    if last {
        container.push(Node::Leaf(ViewSpan {
            offset: *cursor,
            len,
        }));
        *cursor += len;
        return;
    }

    for _ in 0..len {
        if pre_last {
            build_branch(shape, dim + 1, container, cursor);
        } else {
            let mut sub = Vec::new();
            build_branch(shape, dim + 1, &mut sub, cursor);
            container.push(Node::Branch(sub));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BufferData;
    use approx::assert_relative_eq;
    use half::f16;

    fn nested(rows: &[&[f64]]) -> TensorData {
        TensorData::Nested(
            rows.iter()
                .map(|r| TensorData::Numbers(r.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn test_scalar_construction() {
        let t = Tensor::new(&TensorData::Scalar(4.25), Dtype::F32).unwrap();
        assert_eq!(t.shape().dims(), &[1]);
        assert_eq!(t.get(&[0]).unwrap(), 4.25);
    }

    #[test]
    fn test_scalar_non_finite() {
        assert!(Tensor::new(&TensorData::Scalar(f64::NAN), Dtype::F32).is_err());
        assert!(Tensor::new(&TensorData::Scalar(f64::INFINITY), Dtype::F64).is_err());
    }

    #[test]
    fn test_flat_sequence_all_dtypes() {
        let values = vec![1.0, 2.0, 3.0];
        for dtype in &Dtype::ALL {
            let t = Tensor::new(&TensorData::Numbers(values.clone()), *dtype).unwrap();
            assert_eq!(t.shape().dims(), &[3]);
            assert_eq!(t.dtype(), *dtype);
            for (k, &v) in values.iter().enumerate() {
                // Small integers are exact in every dtype, f16 included.
                assert_eq!(t.get(&[k]).unwrap(), v);
            }
        }
    }

    #[test]
    fn test_flat_sequence_f16_epsilon() {
        let t = Tensor::new(&TensorData::Numbers(vec![0.1, 0.2]), Dtype::F16).unwrap();
        assert_relative_eq!(t.get(&[0]).unwrap(), 0.1, epsilon = f16::EPSILON.to_f64());
        assert_relative_eq!(t.get(&[1]).unwrap(), 0.2, epsilon = f16::EPSILON.to_f64());
    }

    #[test]
    fn test_flat_sequence_rejects_non_finite() {
        let err = Tensor::new(&TensorData::Numbers(vec![1.0, f64::NAN]), Dtype::F32).unwrap_err();
        assert!(matches!(err, TensorError::NonFiniteElement));
    }

    #[test]
    fn test_buffer_construction_matching() {
        let t = Tensor::new(
            &TensorData::Buffer(BufferData::I32(vec![5, 6, 7])),
            Dtype::I32,
        )
        .unwrap();
        assert_eq!(t.shape().dims(), &[3]);
        assert_eq!(t.storage().as_i32_slice().unwrap(), &[5, 6, 7]);
    }

    #[test]
    fn test_buffer_construction_converting() {
        let codes = vec![f16::from_f64(1.5).to_bits()];
        let t = Tensor::new(&TensorData::Buffer(BufferData::F16(codes)), Dtype::F64).unwrap();
        assert_eq!(t.get(&[0]).unwrap(), 1.5);
    }

    #[test]
    fn test_nested_shape_and_values() {
        let data = nested(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let t = Tensor::new(&data, Dtype::F32).unwrap();
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.get(&[0, 0]).unwrap(), 1.0);
        assert_eq!(t.get(&[1, 2]).unwrap(), 6.0);
        assert_eq!(t.storage().len(), 6);
    }

    #[test]
    fn test_nested_of_scalars_is_flat() {
        let data = TensorData::Nested(vec![
            TensorData::Scalar(1.0),
            TensorData::Scalar(2.0),
        ]);
        let t = Tensor::new(&data, Dtype::F64).unwrap();
        assert_eq!(t.shape().dims(), &[2]);
        assert!(matches!(t.root(), Node::Leaf(_)));
    }

    #[test]
    fn test_last_two_levels_flattened() {
        // A [2, 3, 4] tensor: the root has 2 branches, each holding 3 leaf
        // rows of length 4 directly (no wrapping level for the inner plane).
        let plane = |base: f64| {
            TensorData::Nested(
                (0..3)
                    .map(|r| {
                        TensorData::Numbers(
                            (0..4).map(|c| base + (r * 4 + c) as f64).collect(),
                        )
                    })
                    .collect(),
            )
        };
        let data = TensorData::Nested(vec![plane(0.0), plane(100.0)]);
        let t = Tensor::new(&data, Dtype::F32).unwrap();

        assert_eq!(t.shape().dims(), &[2, 3, 4]);
        let root = t.root().children();
        assert_eq!(root.len(), 2);
        for branch in root {
            let rows = branch.children();
            assert_eq!(rows.len(), 3);
            for row in rows {
                assert_eq!(row.span().unwrap().len, 4);
            }
        }
        assert_eq!(t.get(&[1, 2, 3]).unwrap(), 111.0);
    }

    #[test]
    fn test_leaf_spans_cover_storage() {
        let data = nested(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        let t = Tensor::new(&data, Dtype::F64).unwrap();
        let spans = t.leaf_spans();
        assert_eq!(spans.len(), 3);
        let total: usize = spans.iter().map(|s| s.len).sum();
        assert_eq!(total, t.storage().len());
        // Spans are contiguous and strictly increasing.
        let mut expected = 0;
        for span in spans {
            assert_eq!(span.offset, expected);
            expected += span.len;
        }
    }

    #[test]
    fn test_nested_buffer_leaves() {
        let data = TensorData::Nested(vec![
            TensorData::Buffer(BufferData::F32(vec![1.0, 2.0])),
            TensorData::Buffer(BufferData::F32(vec![3.0, 4.0])),
        ]);
        let t = Tensor::new(&data, Dtype::F32).unwrap();
        assert_eq!(t.shape().dims(), &[2, 2]);
        assert_eq!(t.storage().as_f32_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_nested_short_row_rejected() {
        let data = nested(&[&[1.0, 2.0, 3.0], &[4.0]]);
        let err = Tensor::new(&data, Dtype::F32).unwrap_err();
        assert!(matches!(err, TensorError::NonFiniteElement));
    }

    #[test]
    fn test_nested_missing_sibling_rejected() {
        // Shape says 2 planes of 2 rows, second plane only has one.
        let data = TensorData::Nested(vec![
            TensorData::Nested(vec![
                TensorData::Numbers(vec![1.0, 2.0]),
                TensorData::Numbers(vec![3.0, 4.0]),
            ]),
            TensorData::Nested(vec![TensorData::Numbers(vec![5.0, 6.0])]),
        ]);
        let err = Tensor::new(&data, Dtype::F32).unwrap_err();
        assert!(matches!(err, TensorError::InvalidDimension));
    }

    #[test]
    fn test_nested_wrong_leaf_kind_rejected() {
        let data = TensorData::Nested(vec![
            TensorData::Nested(vec![TensorData::Nested(vec![TensorData::Scalar(1.0)])]),
        ]);
        // Leaf dimension holds a scalar, not a sequence or buffer.
        assert!(Tensor::new(&data, Dtype::F32).is_err());
    }

    #[test]
    fn test_ragged_buffer_known_inconsistency() {
        // A short trailing buffer row underfills its leaf region and leaves
        // zeros behind. Documented, not normalized.
        let data = TensorData::Nested(vec![
            TensorData::Buffer(BufferData::F32(vec![1.0, 2.0, 3.0])),
            TensorData::Buffer(BufferData::F32(vec![9.0])),
        ]);
        let t = Tensor::new(&data, Dtype::F32).unwrap();
        assert_eq!(t.shape().dims(), &[2, 3]);
        // Second row's copy started at offset 3, first row overwrote
        // nothing there afterwards; element [1,1] was never written.
        assert_eq!(t.get(&[1, 0]).unwrap(), 9.0);
        assert_eq!(t.get(&[1, 1]).unwrap(), 0.0);
    }

    #[test]
    fn test_from_storage_rebuild() {
        let storage = Storage::zeros(Dtype::F32, 6);
        let t = Tensor::from_storage(storage, Shape::new(vec![2, 3])).unwrap();
        assert_eq!(t.leaf_spans().len(), 2);
        assert_eq!(t.leaf_spans()[1], ViewSpan { offset: 3, len: 3 });
    }

    #[test]
    fn test_from_storage_length_mismatch() {
        let storage = Storage::zeros(Dtype::F32, 5);
        let err = Tensor::from_storage(storage, Shape::new(vec![2, 3])).unwrap_err();
        assert!(matches!(err, TensorError::LengthMismatch { .. }));
    }

    #[test]
    fn test_from_storage_deep_tree_matches_fill() {
        let data = TensorData::Nested(vec![
            TensorData::Nested(vec![
                TensorData::Numbers(vec![1.0, 2.0]),
                TensorData::Numbers(vec![3.0, 4.0]),
            ]),
            TensorData::Nested(vec![
                TensorData::Numbers(vec![5.0, 6.0]),
                TensorData::Numbers(vec![7.0, 8.0]),
            ]),
        ]);
        let filled = Tensor::new(&data, Dtype::F32).unwrap();
        let rebuilt =
            Tensor::from_storage(filled.storage().clone(), filled.shape().clone()).unwrap();
        assert_eq!(filled, rebuilt);
    }

    #[test]
    fn test_cast_roundtrip_preserving() {
        let t = Tensor::new(&TensorData::Numbers(vec![1.0, -2.0, 3.0]), Dtype::I32).unwrap();
        let back = t.cast(Dtype::F64).cast(Dtype::I32);
        assert_eq!(back, t);
    }

    #[test]
    fn test_cast_preserves_tree_and_original() {
        let data = nested(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let t = Tensor::new(&data, Dtype::F32).unwrap();
        let c = t.cast(Dtype::F16);
        assert_eq!(c.shape(), t.shape());
        assert_eq!(c.leaf_spans(), t.leaf_spans());
        assert_eq!(c.dtype(), Dtype::F16);
        // Original untouched.
        assert_eq!(t.dtype(), Dtype::F32);
        assert_eq!(t.get(&[1, 1]).unwrap(), 4.0);
    }

    #[test]
    fn test_cast_f32_f16_f32_epsilon_bound() {
        let t = Tensor::new(&TensorData::Numbers(vec![0.1, 2.7, 300.25]), Dtype::F32).unwrap();
        let back = t.cast(Dtype::F16).cast(Dtype::F32);
        for k in 0..3 {
            let a = t.get(&[k]).unwrap();
            let b = back.get(&[k]).unwrap();
            assert_relative_eq!(a, b, max_relative = f16::EPSILON.to_f64());
        }
    }

    #[test]
    fn test_leaf_values() {
        let t = Tensor::new(&TensorData::Numbers(vec![1.0, 2.0, 3.0]), Dtype::F64).unwrap();
        let span = t.leaf_spans()[0];
        assert_eq!(t.leaf_values(span), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_get_index_errors() {
        let t = Tensor::new(&TensorData::Numbers(vec![1.0, 2.0]), Dtype::F32).unwrap();
        assert!(t.get(&[2]).is_err());
        assert!(t.get(&[0, 0]).is_err());
    }
}
