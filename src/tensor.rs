use std::borrow::Cow;

/// Immutable view over a contiguous quantized buffer plus its shape.
///
/// Activations and weights are `i8`, bias is `i32`. The view borrows
/// caller-owned storage by default and only owns data built from vectors;
/// nothing outlives the convolution invocation it was constructed for.
#[derive(Debug, Clone)]
pub struct TensorView<'a, T: Clone> {
    pub data: Cow<'a, [T]>,
    pub shape: Cow<'a, [usize]>,
}

impl<'a, T: Clone> TensorView<'a, T> {
    pub fn new(data: &'a [T], shape: &'a [usize]) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Borrowed(shape),
        }
    }
    pub fn from_owned(data: Vec<T>, shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Owned(data),
            shape: Cow::Owned(shape),
        }
    }
    pub fn from_slice(data: &'a [T], shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Owned(shape),
        }
    }
    pub fn empty() -> Self {
        Self {
            data: Cow::Borrowed(&[]),
            shape: Cow::Borrowed(&[]),
        }
    }
    pub fn dim(&self) -> usize {
        self.shape.len()
    }
    pub fn size(&self, dim: usize) -> usize {
        self.shape[dim]
    }
    pub fn flat_len(&self) -> usize {
        self.data.len()
    }
}
