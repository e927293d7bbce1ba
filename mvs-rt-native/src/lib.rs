#![deny(unsafe_op_in_unsafe_fn)]

//! Native runtime for compiled mvs-calculus programs.
//!
//! The code generator emits calls against the `mvs_*` C ABI exported here.
//! Arrays share storage behind an atomic reference count and uniquify
//! before mutation; existential containers box values behind a witness
//! metatype. Reference counting uses relaxed retains and acquire-release
//! releases so storage handed across threads by a host stays sound.
//!
//! This crate is the compiler's one unsafe boundary: everything operates on
//! raw, type-erased memory the generated code owns.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::mem;
use std::process;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A type-erased descriptor carrying the lifecycle operations of one type.
///
/// `init`, `drop`, and `copy` may be null, which marks the type trivial for
/// that operation: zero-fill, no-op, and bitwise copy respectively.
#[repr(C)]
pub struct MetaType {
    /// Size (and stride) of the type, in bytes.
    pub size: i64,
    pub init: Option<unsafe extern "C" fn(*mut u8)>,
    pub drop: Option<unsafe extern "C" fn(*mut u8)>,
    pub copy: Option<unsafe extern "C" fn(*mut u8, *mut u8)>,
    pub equal: Option<unsafe extern "C" fn(*const u8, *const u8) -> i64>,
}

/// A type-erased array.
///
/// `payload` points `size_of::<ArrayHeader>()` bytes past the start of the
/// storage block, or is null for an empty array.
#[repr(C)]
pub struct AnyArray {
    pub payload: *mut u8,
}

#[repr(C)]
struct ArrayHeader {
    refc: AtomicU64,
    count: i64,
    capacity: i64,
}

/// An existential container: three inline words plus the value witness.
/// Values larger than the inline storage live in a heap block pointed to
/// by the first word.
#[repr(C)]
pub struct Existential {
    pub storage: [i64; 3],
    pub witness: *const MetaType,
}

const ARRAY_HEADER: usize = mem::size_of::<ArrayHeader>();
const EXIST_INLINE: i64 = (mem::size_of::<i64>() * 3) as i64;

/// Allocation prefix recording the block size, so `mvs_free` can rebuild
/// the layout. Sixteen bytes keeps the returned pointer 16-aligned.
const MALLOC_HEADER: usize = 16;
const MALLOC_ALIGN: usize = 16;

/// Allocates a zero-filled block. Allocation failure is fatal.
#[no_mangle]
pub extern "C" fn mvs_malloc(size: i64) -> *mut u8 {
    let Some(total) = (size as usize).checked_add(MALLOC_HEADER) else {
        eprintln!("mvs_malloc: allocation size overflow ({size} bytes)");
        process::abort();
    };
    let Ok(layout) = Layout::from_size_align(total, MALLOC_ALIGN) else {
        eprintln!("mvs_malloc: invalid allocation size ({size} bytes)");
        process::abort();
    };
    let base = unsafe { alloc_zeroed(layout) };
    if base.is_null() {
        handle_alloc_error(layout);
    }
    unsafe {
        (base as *mut usize).write(total);
        base.add(MALLOC_HEADER)
    }
}

/// Frees a block obtained from [`mvs_malloc`]. Null is a no-op.
///
/// # Safety
///
/// `p` must be null or a pointer previously returned by `mvs_malloc` that
/// has not been freed.
#[no_mangle]
pub unsafe extern "C" fn mvs_free(p: *mut u8) {
    if p.is_null() {
        return;
    }
    unsafe {
        let base = p.sub(MALLOC_HEADER);
        let total = (base as *const usize).read();
        let layout = Layout::from_size_align_unchecked(total, MALLOC_ALIGN);
        dealloc(base, layout);
    }
}

unsafe fn header_of(array: *const AnyArray) -> *mut ArrayHeader {
    let payload = unsafe { (*array).payload };
    if payload.is_null() {
        ptr::null_mut()
    } else {
        unsafe { payload.sub(ARRAY_HEADER) as *mut ArrayHeader }
    }
}

/// Initializes `array` with `count` elements of the given stride.
///
/// Elements are initialized with `elem_type.init`, or left zero-filled when
/// the initializer is null.
///
/// # Safety
///
/// `array` must point to an uninitialized array structure and `elem_type`
/// to a valid metatype for the element type.
#[no_mangle]
pub unsafe extern "C" fn mvs_array_init(
    array: *mut AnyArray,
    elem_type: *const MetaType,
    count: i64,
    stride: i64,
) {
    if count <= 0 {
        unsafe { (*array).payload = ptr::null_mut() };
        return;
    }

    let capacity = count * stride;
    let storage = mvs_malloc(ARRAY_HEADER as i64 + capacity);
    unsafe {
        let payload = storage.add(ARRAY_HEADER);
        (*array).payload = payload;
        ptr::write(
            storage as *mut ArrayHeader,
            ArrayHeader {
                refc: AtomicU64::new(1),
                count,
                capacity,
            },
        );
        if let Some(init) = (*elem_type).init {
            for i in 0..count {
                init(payload.offset((i * stride) as isize));
            }
        }
    }
}

/// Releases one reference to `array`'s storage, destroying the elements
/// and freeing the block when it was the last. Clears the payload field.
///
/// # Safety
///
/// `array` must point to an initialized array and `elem_type` to its
/// element metatype.
#[no_mangle]
pub unsafe extern "C" fn mvs_array_drop(array: *mut AnyArray, elem_type: *const MetaType) {
    let header = unsafe { header_of(array) };
    if header.is_null() {
        return;
    }

    // The release must synchronize with every other release so the last
    // owner observes all writes before tearing the block down.
    let prior = unsafe { (*header).refc.fetch_sub(1, Ordering::AcqRel) };
    if prior != 1 {
        return;
    }

    unsafe {
        if let Some(drop) = (*elem_type).drop {
            let stride = (*elem_type).size;
            let payload = (*array).payload;
            for i in 0..(*header).count {
                drop(payload.offset((i * stride) as isize));
            }
        }
        mvs_free(header as *mut u8);
        (*array).payload = ptr::null_mut();
    }
}

/// Copies the array reference, retaining the shared storage.
///
/// # Safety
///
/// `dst` must point to an uninitialized or dropped array structure; `src`
/// must point to an initialized one.
#[no_mangle]
pub unsafe extern "C" fn mvs_array_copy(dst: *mut AnyArray, src: *mut AnyArray) {
    unsafe {
        (*dst).payload = (*src).payload;
        let header = header_of(src);
        if !header.is_null() {
            // Only the counter value matters here; no ordering is needed.
            (*header).refc.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Ensures `array` holds the only reference to its storage, cloning the
/// block element-wise if it is shared.
///
/// # Safety
///
/// `array` must point to an initialized array and `elem_type` to its
/// element metatype.
#[no_mangle]
pub unsafe extern "C" fn mvs_array_uniq(array: *mut AnyArray, elem_type: *const MetaType) {
    let header = unsafe { header_of(array) };
    if header.is_null() {
        return;
    }
    if unsafe { (*header).refc.load(Ordering::Acquire) } == 1 {
        return;
    }

    unsafe {
        let count = (*header).count;
        let capacity = (*header).capacity;
        let storage = mvs_malloc(ARRAY_HEADER as i64 + capacity);
        let payload = storage.add(ARRAY_HEADER);
        ptr::write(
            storage as *mut ArrayHeader,
            ArrayHeader {
                refc: AtomicU64::new(1),
                count,
                capacity,
            },
        );

        match (*elem_type).copy {
            None => {
                ptr::copy_nonoverlapping((*array).payload, payload, capacity as usize);
            }
            Some(copy) => {
                let stride = (*elem_type).size;
                for i in 0..count {
                    copy(
                        payload.offset((i * stride) as isize),
                        (*array).payload.offset((i * stride) as isize),
                    );
                }
            }
        }

        (*header).refc.fetch_sub(1, Ordering::AcqRel);
        (*array).payload = payload;
    }
}

/// Element-wise equality of two arrays of the same element type.
///
/// # Safety
///
/// Both arrays must be initialized and `elem_type` must describe their
/// element type.
#[no_mangle]
pub unsafe extern "C" fn mvs_array_equal(
    lhs: *const AnyArray,
    rhs: *const AnyArray,
    elem_type: *const MetaType,
) -> i64 {
    unsafe {
        if (*lhs).payload == (*rhs).payload {
            return 1;
        }
        let lh = header_of(lhs);
        let rh = header_of(rhs);
        let lcount = if lh.is_null() { 0 } else { (*lh).count };
        let rcount = if rh.is_null() { 0 } else { (*rh).count };
        if lcount != rcount {
            return 0;
        }

        let stride = (*elem_type).size;
        for i in 0..lcount {
            let a = (*lhs).payload.offset((i * stride) as isize);
            let b = (*rhs).payload.offset((i * stride) as isize);
            let eq = match (*elem_type).equal {
                Some(equal) => equal(a, b),
                None => bytes_equal(a, b, stride as usize),
            };
            if eq == 0 {
                return 0;
            }
        }
        1
    }
}

unsafe fn bytes_equal(a: *const u8, b: *const u8, n: usize) -> i64 {
    let a = unsafe { std::slice::from_raw_parts(a, n) };
    let b = unsafe { std::slice::from_raw_parts(b, n) };
    i64::from(a == b)
}

unsafe fn exist_data(container: *const Existential) -> *mut u8 {
    unsafe {
        let witness = (*container).witness;
        let storage = ptr::addr_of!((*container).storage) as *mut u8;
        if (*witness).size <= EXIST_INLINE {
            storage
        } else {
            (storage as *const *mut u8).read()
        }
    }
}

/// Destroys an existential container, including out-of-line storage.
///
/// # Safety
///
/// `container` must point to an initialized container with a valid witness.
#[no_mangle]
pub unsafe extern "C" fn mvs_exist_drop(container: *mut Existential) {
    unsafe {
        let witness = (*container).witness;
        let data = exist_data(container);
        if let Some(drop) = (*witness).drop {
            drop(data);
        }
        if (*witness).size > EXIST_INLINE {
            mvs_free(data);
        }
        ptr::write_bytes(container as *mut u8, 0, mem::size_of::<Existential>());
    }
}

/// Copies an existential container, boxing the value again when it is
/// stored out of line.
///
/// # Safety
///
/// `dst` must point to an uninitialized or dropped container; `src` must
/// point to an initialized one.
#[no_mangle]
pub unsafe extern "C" fn mvs_exist_copy(dst: *mut Existential, src: *mut Existential) {
    unsafe {
        let witness = (*src).witness;
        (*dst).witness = witness;

        let src_data = exist_data(src);
        let dst_data = if (*witness).size <= EXIST_INLINE {
            ptr::addr_of_mut!((*dst).storage) as *mut u8
        } else {
            let boxed = mvs_malloc((*witness).size);
            (ptr::addr_of_mut!((*dst).storage) as *mut *mut u8).write(boxed);
            boxed
        };

        match (*witness).copy {
            None => ptr::copy_nonoverlapping(src_data, dst_data, (*witness).size as usize),
            Some(copy) => copy(dst_data, src_data),
        }
    }
}

/// Equality of two existential containers: same witness, equal values.
///
/// # Safety
///
/// Both containers must be initialized with valid witnesses.
#[no_mangle]
pub unsafe extern "C" fn mvs_exist_equal(lhs: *const Existential, rhs: *const Existential) -> i64 {
    unsafe {
        let witness = (*lhs).witness;
        if witness != (*rhs).witness {
            return 0;
        }
        let a = exist_data(lhs);
        let b = exist_data(rhs);
        match (*witness).equal {
            Some(equal) => equal(a, b),
            None => bytes_equal(a, b, (*witness).size as usize),
        }
    }
}

#[no_mangle]
pub extern "C" fn mvs_print_i64(value: i64) {
    println!("{value}");
}

#[no_mangle]
pub extern "C" fn mvs_print_f64(value: f64) {
    println!("{value:.6}");
}

/// Nanoseconds since the epoch, as a double. Only differences are
/// meaningful.
#[no_mangle]
pub extern "C" fn mvs_uptime_nanoseconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as f64)
        .unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn mvs_sqrt(x: f64) -> f64 {
    x.sqrt()
}

#[cfg(test)]
mod tests;
