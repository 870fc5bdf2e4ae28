use ringbuf::{HeapRb, Rb};

/// Fixed-size window over the most recent samples, with a running sum so the average is O(1).
pub struct BoundedQueue {
    rb: HeapRb<u64>,
    cap: usize,
    sum: u64,
}

impl BoundedQueue {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            rb: HeapRb::new(cap),
            cap,
            sum: 0,
        }
    }

    /// Pushes a sample, evicting the oldest one once the window is full.
    pub fn push(&mut self, x: u64) {
        if self.is_full() {
            if let Some(oldest) = self.rb.iter().next() {
                self.sum -= *oldest;
            }
        }
        self.rb.push_overwrite(x);
        self.sum += x;
    }

    pub fn avg(&self) -> f64 {
        if self.rb.len() == 0 {
            0.
        } else {
            self.sum as f64 / self.rb.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.rb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rb.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.rb.len() >= self.cap
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn clear(&mut self) {
        self.rb.clear();
        self.sum = 0;
    }
}
