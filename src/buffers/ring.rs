/// Fixed-capacity history of rows, overwritten oldest first.
///
/// Storage is one flat arena of `capacity * width` values indexed by a
/// wrap-around cursor. It is reallocated only by [`RingBuffer::resize`] and
/// only when the shape actually changes.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    width: usize,
    capacity: usize,
    /// Row the next push writes to
    head: usize,
    filled: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(width: usize, capacity: usize) -> Self {
        Self {
            data: vec![T::default(); width * capacity],
            width,
            capacity,
            head: 0,
            filled: 0,
        }
    }

    /// Change the shape. Returns true when storage was reallocated, in which
    /// case the history is cleared; an unchanged shape keeps the contents.
    pub fn resize(&mut self, width: usize, capacity: usize) -> bool {
        if width == self.width && capacity == self.capacity {
            return false;
        }
        self.data = vec![T::default(); width * capacity];
        self.width = width;
        self.capacity = capacity;
        self.clear();
        true
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.filled = 0;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows currently held
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.capacity
    }

    /// Append a row, evicting the oldest when full. Short rows are padded
    /// with defaults, long rows truncated.
    pub fn push(&mut self, row: &[T]) {
        if self.capacity == 0 {
            return;
        }
        let start = self.head * self.width;
        let slot = &mut self.data[start..start + self.width];
        let n = row.len().min(self.width);
        slot[..n].copy_from_slice(&row[..n]);
        slot[n..].fill(T::default());

        self.head = (self.head + 1) % self.capacity;
        self.filled = (self.filled + 1).min(self.capacity);
    }

    /// Row `index` counted from the oldest held row
    pub fn row(&self, index: usize) -> Option<&[T]> {
        if index >= self.filled {
            return None;
        }
        let oldest = (self.head + self.capacity - self.filled) % self.capacity;
        let slot = (oldest + index) % self.capacity;
        let start = slot * self.width;
        Some(&self.data[start..start + self.width])
    }

    /// Most recently pushed row
    pub fn newest(&self) -> Option<&[T]> {
        self.filled.checked_sub(1).and_then(|i| self.row(i))
    }

    /// Rows from oldest to newest
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.filled).filter_map(move |i| self.row(i))
    }

    /// Copy rows oldest to newest into `out`, returning the number of values
    pub fn copy_to(&self, out: &mut [T]) -> usize {
        let mut written = 0;
        for row in self.rows() {
            let n = row.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&row[..n]);
            written += n;
            if written == out.len() {
                break;
            }
        }
        written
    }
}

impl RingBuffer<f32> {
    /// Column means over the held rows; zeros when empty
    pub fn mean_into(&self, out: &mut [f32]) {
        out.fill(0.0);
        if self.filled == 0 {
            return;
        }
        for row in self.rows() {
            for (acc, v) in out.iter_mut().zip(row) {
                *acc += *v;
            }
        }
        let n = self.filled as f32;
        for acc in out.iter_mut() {
            *acc /= n;
        }
    }
}
