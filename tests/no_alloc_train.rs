use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use pixel_mlp::{Activation, Mlp, Sample};

struct CountingAlloc {
    allocs: AtomicUsize,
    reallocs: AtomicUsize,
}

impl CountingAlloc {
    const fn new() -> Self {
        Self {
            allocs: AtomicUsize::new(0),
            reallocs: AtomicUsize::new(0),
        }
    }

    fn reset(&self) {
        self.allocs.store(0, Ordering::Relaxed);
        self.reallocs.store(0, Ordering::Relaxed);
    }

    fn alloc_events(&self) -> usize {
        self.allocs.load(Ordering::Relaxed) + self.reallocs.load(Ordering::Relaxed)
    }
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.reallocs.fetch_add(1, Ordering::Relaxed);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc::new();

fn make_batch(len: usize, input_dim: usize, target_dim: usize) -> Vec<Sample> {
    (0..len)
        .map(|_| Sample::new(vec![0.1_f32; input_dim], vec![0.0_f32; target_dim]))
        .collect()
}

#[test]
fn train_does_not_allocate_per_sample() {
    let base = Mlp::new_with_seed(&[4, 64, 32, 3], 1e-2, Activation::Sigmoid, 0).unwrap();

    let small = make_batch(16, 4, 3);
    let large = make_batch(16 * 64, 4, 3);

    // Warm up so one-time setup (e.g. log callsite registration) is not counted.
    base.clone().train(&small, 1).unwrap();

    let mut mlp_small = base.clone();
    ALLOC.reset();
    mlp_small.train(&small, 1).unwrap();
    let alloc_small = ALLOC.alloc_events();

    let mut mlp_large = base;
    ALLOC.reset();
    mlp_large.train(&large, 1).unwrap();
    let alloc_large = ALLOC.alloc_events();

    assert_eq!(
        alloc_small, alloc_large,
        "expected allocation event count to be independent of the number of steps"
    );
}
