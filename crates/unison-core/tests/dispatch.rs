//! Dispatching pipelines over shared buffers.

mod common;

use common::{mock_device, ADD, COPY, MAX_WORKGROUPS, NOOP, SUB};
use unison_core::{CompileError, DispatchError, Grid};

// ── compile ───────────────────────────────────────────────────────────────

#[test]
fn compile_reports_missing_entry_point() {
    let (device, _) = mock_device();
    let err = device.compile(ADD, "mul").unwrap_err();
    assert!(matches!(err, CompileError::MissingEntryPoint(name) if name == "mul"));
}

#[test]
fn pipelines_remember_their_entry_point() {
    let (device, _) = mock_device();
    let add = device.compile(ADD, "add").unwrap();
    let sub = device.compile(SUB, "sub").unwrap();
    assert_eq!(add.entry_point(), "add");
    assert_ne!(add.handle(), sub.handle());
}

// ── run ───────────────────────────────────────────────────────────────────

#[test]
fn add_scenario() {
    let (device, calls) = mock_device();
    let mut a = device.allocate::<i32>(4).unwrap();
    let mut b = device.allocate::<i32>(4).unwrap();
    let mut out = device.allocate::<i32>(4).unwrap();
    a.copy_from_slice(&[1, 2, 3, 4]);
    b.copy_from_slice(&[10, 20, 30, 40]);

    let add = device.compile(ADD, "add").unwrap();
    device.run(&add, &mut [&mut a, &mut b, &mut out]).unwrap();

    assert_eq!(&*out, &[11, 22, 33, 44]);
    assert_eq!(&*a, &[1, 2, 3, 4]);
    assert_eq!(calls.dispatches(), 1);
}

#[test]
fn copy_round_trip() {
    let (device, _) = mock_device();
    let mut src = device.allocate::<i32>(3).unwrap();
    let mut dst = device.allocate::<i32>(3).unwrap();
    src.copy_from_slice(&[i32::MIN, 0, 42]);

    let copy = device.compile(COPY, "copy").unwrap();
    device.run(&copy, &mut [&mut src, &mut dst]).unwrap();

    assert_eq!(&*dst, &[i32::MIN, 0, 42]);
}

#[test]
fn argument_order_is_binding_order() {
    let (device, _) = mock_device();
    let mut a = device.allocate::<i32>(3).unwrap();
    let mut b = device.allocate::<i32>(3).unwrap();
    let mut out = device.allocate::<i32>(3).unwrap();
    a.copy_from_slice(&[5, 10, 15]);
    b.copy_from_slice(&[1, 2, 3]);

    let sub = device.compile(SUB, "sub").unwrap();

    device.run(&sub, &mut [&mut a, &mut b, &mut out]).unwrap();
    let forward = out.to_vec();
    device.run(&sub, &mut [&mut b, &mut a, &mut out]).unwrap();
    let swapped = out.to_vec();

    assert_eq!(forward, [4, 8, 12]);
    assert_eq!(swapped, forward.iter().map(|x| -x).collect::<Vec<_>>());
}

#[test]
fn run_without_buffers() {
    let (device, calls) = mock_device();
    let noop = device.compile(NOOP, "noop").unwrap();
    device.run(&noop, &mut []).unwrap();
    assert_eq!(calls.dispatches(), 1);
}

#[test]
fn pipelines_are_reusable() {
    let (device, _) = mock_device();
    let copy = device.compile(COPY, "copy").unwrap();
    let mut src = device.allocate::<i32>(1).unwrap();
    let mut dst = device.allocate::<i32>(1).unwrap();

    for value in [3, -9, 27] {
        src[0] = value;
        device.run(&copy, &mut [&mut src, &mut dst]).unwrap();
        assert_eq!(dst[0], value);
    }
}

// ── failures ──────────────────────────────────────────────────────────────

#[test]
fn argument_count_mismatch() {
    let (device, _) = mock_device();
    let add = device.compile(ADD, "add").unwrap();
    let mut a = device.allocate::<i32>(1).unwrap();
    let mut b = device.allocate::<i32>(1).unwrap();

    let err = device.run(&add, &mut [&mut a, &mut b]).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::ArgumentCount { expected: 3, actual: 2 }
    ));
}

#[test]
fn same_allocation_twice_is_rejected() {
    let (device, _) = mock_device();
    let copy = device.compile(COPY, "copy").unwrap();
    let buf = device.allocate::<i32>(1).unwrap();
    let handle = buf.handle();

    // SAFETY: rejected before any device work.
    let err = unsafe { device.run_handles(&copy, Grid::Auto, &[handle, handle]) }.unwrap_err();
    assert!(matches!(err, DispatchError::DuplicateArgument(h) if h == handle));
}

#[test]
fn empty_buffer_cannot_be_bound() {
    let (device, _) = mock_device();
    let copy = device.compile(COPY, "copy").unwrap();
    let mut empty = device.allocate::<i32>(0).unwrap();
    let mut dst = device.allocate::<i32>(1).unwrap();

    let err = device.run(&copy, &mut [&mut empty, &mut dst]).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownBuffer(h) if h.is_null()));
}

#[test]
fn oversized_grid_is_rejected() {
    let (device, _) = mock_device();
    let noop = device.compile(NOOP, "noop").unwrap();

    let err = device
        .run_with(&noop, Grid::linear(MAX_WORKGROUPS + 1), &mut [])
        .unwrap_err();
    assert!(matches!(err, DispatchError::GridTooLarge { .. }));

    device.run_with(&noop, Grid::linear(MAX_WORKGROUPS), &mut []).unwrap();
}

#[test]
fn buffers_of_another_device_are_rejected() {
    let (first, _) = mock_device();
    let (second, calls) = mock_device();

    let mut src = first.allocate::<i32>(2).unwrap();
    let mut dst = first.allocate::<i32>(2).unwrap();
    src.copy_from_slice(&[1, 2]);

    let mut own_src = second.allocate::<i32>(2).unwrap();
    let mut own_dst = second.allocate::<i32>(2).unwrap();
    own_src.copy_from_slice(&[7, 8]);

    let copy = second.compile(COPY, "copy").unwrap();
    let err = second.run(&copy, &mut [&mut src, &mut dst]).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownBuffer(h) if h == src.handle()));
    assert_eq!(calls.dispatches(), 0);

    assert_eq!(&*own_dst, &[0, 0]);
    assert_eq!(&*dst, &[0, 0]);

    second.run(&copy, &mut [&mut own_src, &mut own_dst]).unwrap();
    assert_eq!(&*own_dst, &[7, 8]);
}

#[test]
fn pipelines_of_another_device_are_rejected() {
    let (first, _) = mock_device();
    let (second, calls) = mock_device();

    let theirs = first.compile(NOOP, "noop").unwrap();
    let _ours = second.compile(NOOP, "noop").unwrap();
    assert_eq!(theirs.device_id(), first.id());

    let err = second.run(&theirs, &mut []).unwrap_err();
    assert!(matches!(err, DispatchError::UnknownPipeline(h) if h == theirs.handle()));
    assert_eq!(calls.dispatches(), 0);
}

#[test]
fn errors_convert_into_the_umbrella_type() {
    let (device, _) = mock_device();

    let run = || -> Result<(), unison_core::Error> {
        let noop = device.compile(NOOP, "noop")?;
        let mut a = device.allocate::<i32>(1)?;
        device.run(&noop, &mut [&mut a])?;
        Ok(())
    };

    assert!(matches!(
        run().unwrap_err(),
        unison_core::Error::Dispatch(DispatchError::ArgumentCount { expected: 0, actual: 1 })
    ));
}
