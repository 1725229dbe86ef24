use bytemuck::{Pod, Zeroable};

use crate::AliasedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

#[test]
fn test_new_is_zeroed() {
    let buffer = AliasedBuffer::<u32, f32>::new(16).unwrap();
    assert_eq!(buffer.len(), 16);
    assert_eq!(buffer.byte_len(), 64);
    assert!(buffer.primary().iter().all(|&x| x == 0));
    assert!(buffer.secondary().iter().all(|&x| x == 0.0));
}

#[test]
fn test_size_mismatch_is_rejected() {
    let err = AliasedBuffer::<u32, u64>::new(8).unwrap_err();
    assert!(err.is_size_mismatch());

    let err = AliasedBuffer::<u16, [u8; 3]>::from_vec(vec![1, 2, 3]).unwrap_err();
    assert!(err.is_size_mismatch());

    // The check does not depend on the length.
    let err = AliasedBuffer::<u8, u16>::new(0).unwrap_err();
    assert!(err.is_size_mismatch());
}

#[test]
fn test_views_share_bytes() {
    let mut buffer = AliasedBuffer::<u32, Rgba>::from_vec(vec![0x04030201, 0x08070605]).unwrap();
    assert_eq!(
        buffer.as_bytes(),
        bytemuck::cast_slice::<Rgba, u8>(buffer.secondary())
    );
    assert_eq!(
        buffer.as_bytes(),
        bytemuck::cast_slice::<u32, u8>(buffer.primary())
    );

    buffer.secondary_mut()[1] = Rgba {
        r: 0xff,
        g: 0,
        b: 0,
        a: 0,
    };
    assert_eq!(buffer.primary()[1], u32::from_le_bytes([0xff, 0, 0, 0]));

    buffer.primary_mut()[0] = u32::from_le_bytes([1, 2, 3, 4]);
    assert_eq!(
        buffer.secondary()[0],
        Rgba {
            r: 1,
            g: 2,
            b: 3,
            a: 4
        }
    );
}

#[test]
fn test_float_bits_alias() {
    let mut buffer = AliasedBuffer::<f32, u32>::new(3).unwrap();
    buffer.primary_mut().copy_from_slice(&[1.0, -2.5, 0.0]);
    assert_eq!(
        buffer.secondary(),
        &[1.0f32.to_bits(), (-2.5f32).to_bits(), 0]
    );
}

#[test]
fn test_from_vec_keeps_allocation() {
    let values: Vec<u64> = (0..100).collect();
    let ptr = values.as_ptr() as usize;
    let buffer = AliasedBuffer::<u64, f64>::from_vec(values).unwrap();
    assert_eq!(buffer.as_ptr().as_ptr() as usize, ptr);
    assert_eq!(buffer.len(), 100);
    assert_eq!(buffer.primary()[99], 99);
}

#[test]
fn test_from_vec_with_spare_capacity() {
    let mut values = Vec::with_capacity(64);
    values.extend_from_slice(&[6i32, 9, 4, 2]);
    let buffer = AliasedBuffer::<i32, u32>::from_vec(values).unwrap();
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.primary(), &[6, 9, 4, 2]);
}

#[test]
fn test_from_vec_stricter_secondary_alignment() {
    let values = vec![[1u8, 0, 0, 0], [2, 0, 0, 0], [3, 0, 0, 0]];
    let buffer = AliasedBuffer::<[u8; 4], u32>::from_vec(values).unwrap();
    assert!(
        (buffer.as_ptr().as_ptr() as usize).is_multiple_of(std::mem::align_of::<u32>())
    );
    assert_eq!(
        buffer.secondary(),
        &[
            u32::from_le_bytes([1, 0, 0, 0]),
            u32::from_le_bytes([2, 0, 0, 0]),
            u32::from_le_bytes([3, 0, 0, 0])
        ]
    );
}

#[test]
fn test_empty_buffers() {
    let buffer = AliasedBuffer::<u32, i32>::new(0).unwrap();
    assert!(buffer.is_empty());
    assert!(buffer.primary().is_empty());
    assert!(buffer.secondary().is_empty());

    let buffer = AliasedBuffer::<u32, i32>::from_vec(Vec::new()).unwrap();
    assert!(buffer.is_empty());
    assert!((buffer.as_ptr().as_ptr() as usize).is_multiple_of(4));
}

#[test]
fn test_zero_sized_elements() {
    let mut buffer = AliasedBuffer::<(), ()>::new(10).unwrap();
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.byte_len(), 0);
    assert_eq!(buffer.primary().len(), 10);
    buffer.resize(20).unwrap();
    assert_eq!(buffer.secondary().len(), 20);
}

#[test]
fn test_resize_grow_preserves_prefix() {
    let values: Vec<u32> = (1..=8).collect();
    let mut buffer = AliasedBuffer::<u32, f32>::from_vec(values.clone()).unwrap();
    buffer.resize(16).unwrap();
    assert_eq!(buffer.len(), 16);
    assert_eq!(&buffer.primary()[..8], values.as_slice());
    assert!(buffer.primary()[8..].iter().all(|&x| x == 0));
    assert_eq!(buffer.secondary().len(), 16);
}

#[test]
fn test_resize_shrink_preserves_prefix() {
    let mut buffer = AliasedBuffer::<u16, i16>::from_slice(&[1, 2, 3, 4, 5]).unwrap();
    buffer.resize(2).unwrap();
    assert_eq!(buffer.primary(), &[1, 2]);
    assert_eq!(buffer.secondary(), &[1, 2]);
    buffer.resize(0).unwrap();
    assert!(buffer.is_empty());
    buffer.resize(3).unwrap();
    assert_eq!(buffer.primary(), &[0, 0, 0]);
}

#[test]
fn test_resize_same_len_keeps_address() {
    let mut buffer = AliasedBuffer::<u64, i64>::new(32).unwrap();
    let ptr = buffer.as_ptr();
    buffer.resize(32).unwrap();
    assert_eq!(buffer.as_ptr(), ptr);
}

#[test]
fn test_resize_random() {
    fastrand::seed(7340128);
    let mut buffer = AliasedBuffer::<u32, [u8; 4]>::new(0).unwrap();
    let mut model = Vec::<u32>::new();
    for _ in 0..200 {
        let new_len = fastrand::usize(0..300);
        buffer.resize(new_len).unwrap();
        model.resize(new_len, 0);
        assert_eq!(buffer.primary(), model.as_slice());

        if !model.is_empty() {
            let i = fastrand::usize(0..model.len());
            let value = fastrand::u32(..);
            buffer.primary_mut()[i] = value;
            model[i] = value;
            assert_eq!(buffer.secondary()[i], value.to_ne_bytes());
        }
    }
}

#[test]
fn test_two_step_resize() {
    let mut buffer = AliasedBuffer::<u16, i16>::from_slice(&[1, 2, 3]).unwrap();
    let ptr = buffer.as_ptr();

    let pending = buffer.prepare_resize(5).unwrap();
    assert_eq!(pending.len(), 5);
    assert_eq!(buffer.as_ptr(), ptr);
    assert_eq!(buffer.primary(), &[1, 2, 3]);

    buffer.commit_resize(pending);
    assert_eq!(buffer.primary(), &[1, 2, 3, 0, 0]);
    assert_ne!(buffer.as_ptr(), ptr);
}

#[test]
fn test_failed_or_abandoned_resize_keeps_buffer() {
    let mut buffer = AliasedBuffer::<u64>::from_slice(&[7, 8]).unwrap();
    let ptr = buffer.as_ptr();
    assert!(buffer.prepare_resize(usize::MAX / 4).is_err());
    drop(buffer.prepare_resize(100).unwrap());
    assert!(buffer.resize(usize::MAX / 4).is_err());
    assert_eq!(buffer.as_ptr(), ptr);
    assert_eq!(buffer.primary(), &[7, 8]);
}

#[test]
fn test_region_outlives_buffer() {
    let mut buffer = AliasedBuffer::<u32, f32>::from_slice(&[10, 20, 30]).unwrap();
    let region = buffer.region();
    assert_eq!(region.as_ptr(), buffer.as_ptr());
    assert!(region.ptr_eq(&buffer.region()));

    buffer.resize(4).unwrap();
    assert!(!region.ptr_eq(&buffer.region()));
    buffer.dispose();

    // The old region is still allocated and holds the elements it had.
    // SAFETY: `region` keeps three initialized `u32`s alive.
    let old = unsafe { std::slice::from_raw_parts(region.as_ptr().cast::<u32>().as_ptr(), 3) };
    assert_eq!(old, &[10, 20, 30]);
}

#[test]
fn test_clear() {
    let mut buffer = AliasedBuffer::<i32, u32>::from_slice(&[6, 9, 4, 2]).unwrap();
    buffer.clear();
    assert_eq!(buffer.primary(), &[0, 0, 0, 0]);
    assert_eq!(buffer.len(), 4);
}

#[test]
fn test_overflowing_len() {
    let err = AliasedBuffer::<u64, f64>::new(usize::MAX / 2).unwrap_err();
    assert!(!err.is_size_mismatch());
}

#[test]
fn test_dispose() {
    let buffer = AliasedBuffer::<i32, f32>::from_slice(&[3, 0, 3, 0]).unwrap();
    assert_eq!(buffer.to_vec(), vec![3, 0, 3, 0]);
    buffer.dispose();
}

#[test]
fn test_alignment() {
    assert_eq!(AliasedBuffer::<[u8; 8], u64>::alignment(), 8);
    assert_eq!(AliasedBuffer::<u64, [u8; 8]>::alignment(), 8);
    let buffer = AliasedBuffer::<[u8; 8], u64>::new(5).unwrap();
    assert!((buffer.as_ptr().as_ptr() as usize).is_multiple_of(8));
}
