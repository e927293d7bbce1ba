use std::ptr;
use std::sync::atomic::Ordering;

use super::*;

static I64_META: MetaType = MetaType {
    size: 8,
    init: None,
    drop: None,
    copy: None,
    equal: Some(i64_equal),
};

unsafe extern "C" fn i64_equal(a: *const u8, b: *const u8) -> i64 {
    unsafe { i64::from((a as *const i64).read() == (b as *const i64).read()) }
}

// Element metatype for arrays whose elements are themselves `[Int]`.
static ARRAY_OF_I64_META: MetaType = MetaType {
    size: 8,
    init: None,
    drop: Some(inner_drop),
    copy: Some(inner_copy),
    equal: Some(inner_equal),
};

unsafe extern "C" fn inner_drop(p: *mut u8) {
    unsafe { mvs_array_drop(p as *mut AnyArray, &I64_META) }
}

unsafe extern "C" fn inner_copy(dst: *mut u8, src: *mut u8) {
    unsafe { mvs_array_copy(dst as *mut AnyArray, src as *mut AnyArray) }
}

unsafe extern "C" fn inner_equal(a: *const u8, b: *const u8) -> i64 {
    unsafe { mvs_array_equal(a as *const AnyArray, b as *const AnyArray, &I64_META) }
}

fn new_array() -> AnyArray {
    AnyArray {
        payload: ptr::null_mut(),
    }
}

fn refcount(array: &AnyArray) -> u64 {
    let header = unsafe { header_of(array) };
    assert!(!header.is_null(), "expected allocated storage");
    unsafe { (*header).refc.load(Ordering::Relaxed) }
}

unsafe fn write_i64(array: &AnyArray, index: i64, value: i64) {
    unsafe { (array.payload as *mut i64).offset(index as isize).write(value) }
}

unsafe fn read_i64(array: &AnyArray, index: i64) -> i64 {
    unsafe { (array.payload as *const i64).offset(index as isize).read() }
}

#[test]
fn malloc_zero_fills_and_frees() {
    let p = mvs_malloc(64);
    unsafe {
        for i in 0..64 {
            assert_eq!(p.add(i).read(), 0);
        }
        p.write(0xAB);
        mvs_free(p);
    }
}

#[test]
fn init_allocates_unique_zeroed_storage() {
    let mut a = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 3, 8);
        assert!(!a.payload.is_null());
        assert_eq!(refcount(&a), 1);
        for i in 0..3 {
            assert_eq!(read_i64(&a, i), 0);
        }
        mvs_array_drop(&mut a, &I64_META);
        assert!(a.payload.is_null());
    }
}

#[test]
fn empty_arrays_have_null_payload() {
    let mut a = new_array();
    let mut b = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 0, 8);
        mvs_array_init(&mut b, &I64_META, 0, 8);
        assert!(a.payload.is_null());
        assert_eq!(mvs_array_equal(&a, &b, &I64_META), 1);
        // Dropping an empty array is a no-op.
        mvs_array_drop(&mut a, &I64_META);
        mvs_array_drop(&mut b, &I64_META);
    }
}

#[test]
fn copy_shares_storage_and_retains() {
    let mut a = new_array();
    let mut b = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 2, 8);
        mvs_array_copy(&mut b, &mut a);
        assert_eq!(a.payload, b.payload);
        assert_eq!(refcount(&a), 2);

        mvs_array_drop(&mut b, &I64_META);
        assert_eq!(refcount(&a), 1);
        mvs_array_drop(&mut a, &I64_META);
    }
}

#[test]
fn uniq_clones_shared_storage() {
    let mut a = new_array();
    let mut b = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 2, 8);
        write_i64(&a, 0, 4);
        write_i64(&a, 1, 2);

        mvs_array_copy(&mut b, &mut a);
        mvs_array_uniq(&mut b, &I64_META);
        assert_ne!(a.payload, b.payload);
        assert_eq!(refcount(&a), 1);
        assert_eq!(refcount(&b), 1);

        // Mutating the clone leaves the original untouched.
        write_i64(&b, 1, 8);
        assert_eq!(read_i64(&a, 1), 2);
        assert_eq!(read_i64(&b, 1), 8);

        mvs_array_drop(&mut a, &I64_META);
        mvs_array_drop(&mut b, &I64_META);
    }
}

#[test]
fn uniq_is_idempotent() {
    let mut a = new_array();
    let mut b = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 2, 8);
        mvs_array_copy(&mut b, &mut a);

        mvs_array_uniq(&mut b, &I64_META);
        let first = b.payload;
        mvs_array_uniq(&mut b, &I64_META);
        assert_eq!(b.payload, first);

        mvs_array_drop(&mut a, &I64_META);
        mvs_array_drop(&mut b, &I64_META);
    }
}

#[test]
fn uniq_copies_non_trivial_elements_element_wise() {
    let mut inner = new_array();
    let mut outer = new_array();
    let mut shared = new_array();
    unsafe {
        mvs_array_init(&mut inner, &I64_META, 1, 8);
        write_i64(&inner, 0, 7);

        // outer = [inner]; the element slot takes over the reference.
        mvs_array_init(&mut outer, &ARRAY_OF_I64_META, 1, 8);
        (outer.payload as *mut AnyArray).write(AnyArray {
            payload: inner.payload,
        });

        mvs_array_copy(&mut shared, &mut outer);
        mvs_array_uniq(&mut shared, &ARRAY_OF_I64_META);

        // A deep uniq retains the inner storage through the element copy
        // rather than duplicating raw bytes.
        let elem = &*(shared.payload as *const AnyArray);
        assert_eq!(elem.payload, inner.payload);
        assert_eq!(refcount(&inner), 2);

        mvs_array_drop(&mut shared, &ARRAY_OF_I64_META);
        assert_eq!(refcount(&inner), 1);
        mvs_array_drop(&mut outer, &ARRAY_OF_I64_META);
    }
}

#[test]
fn equality_compares_elements() {
    let mut a = new_array();
    let mut b = new_array();
    let mut c = new_array();
    unsafe {
        mvs_array_init(&mut a, &I64_META, 2, 8);
        mvs_array_init(&mut b, &I64_META, 2, 8);
        mvs_array_init(&mut c, &I64_META, 1, 8);
        write_i64(&a, 0, 1);
        write_i64(&a, 1, 2);
        write_i64(&b, 0, 1);
        write_i64(&b, 1, 2);

        assert_eq!(mvs_array_equal(&a, &a, &I64_META), 1);
        assert_eq!(mvs_array_equal(&a, &b, &I64_META), 1);
        assert_eq!(mvs_array_equal(&a, &c, &I64_META), 0);

        write_i64(&b, 1, 3);
        assert_eq!(mvs_array_equal(&a, &b, &I64_META), 0);

        mvs_array_drop(&mut a, &I64_META);
        mvs_array_drop(&mut b, &I64_META);
        mvs_array_drop(&mut c, &I64_META);
    }
}

#[test]
fn existential_inline_round_trip() {
    let mut a = Existential {
        storage: [42, 0, 0],
        witness: &I64_META,
    };
    let mut b = Existential {
        storage: [0, 0, 0],
        witness: ptr::null(),
    };
    unsafe {
        mvs_exist_copy(&mut b, &mut a);
        assert_eq!(b.storage[0], 42);
        assert_eq!(mvs_exist_equal(&a, &b), 1);

        b.storage[0] = 7;
        assert_eq!(mvs_exist_equal(&a, &b), 0);

        mvs_exist_drop(&mut a);
        mvs_exist_drop(&mut b);
    }
}

#[test]
fn existential_boxes_large_values() {
    // A 32-byte value does not fit the three inline words.
    static WIDE_META: MetaType = MetaType {
        size: 32,
        init: None,
        drop: None,
        copy: None,
        equal: None,
    };

    unsafe {
        let boxed = mvs_malloc(32);
        (boxed as *mut i64).write(11);
        let mut a = Existential {
            storage: [0, 0, 0],
            witness: &WIDE_META,
        };
        (ptr::addr_of_mut!(a.storage) as *mut *mut u8).write(boxed);

        let mut b = Existential {
            storage: [0, 0, 0],
            witness: ptr::null(),
        };
        mvs_exist_copy(&mut b, &mut a);

        let a_data = (ptr::addr_of!(a.storage) as *const *mut u8).read();
        let b_data = (ptr::addr_of!(b.storage) as *const *mut u8).read();
        assert_ne!(a_data, b_data);
        assert_eq!(mvs_exist_equal(&a, &b), 1);

        mvs_exist_drop(&mut a);
        mvs_exist_drop(&mut b);
    }
}

#[test]
fn mismatched_witnesses_are_never_equal() {
    static OTHER_META: MetaType = MetaType {
        size: 8,
        init: None,
        drop: None,
        copy: None,
        equal: Some(i64_equal),
    };

    let a = Existential {
        storage: [1, 0, 0],
        witness: &I64_META,
    };
    let b = Existential {
        storage: [1, 0, 0],
        witness: &OTHER_META,
    };
    unsafe {
        assert_eq!(mvs_exist_equal(&a, &b), 0);
    }
}
