use anyhow::{ensure, Context, Result};
use unison_core::{initialize, init_logging, DeviceInit, LoggingConfig};

const ADD: &str = r#"
    @group(0) @binding(0) var<storage, read> a: array<i32>;
    @group(0) @binding(1) var<storage, read> b: array<i32>;
    @group(0) @binding(2) var<storage, read_write> out: array<i32>;

    @compute @workgroup_size(64)
    fn add(@builtin(global_invocation_id) id: vec3<u32>) {
        if id.x < arrayLength(&out) {
            out[id.x] = a[id.x] + b[id.x];
        }
    }
"#;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let device = initialize(DeviceInit::default()).context("initializing compute device")?;

    let mut a = device.allocate::<i32>(4).context("allocating `a`")?;
    let mut b = device.allocate::<i32>(4).context("allocating `b`")?;
    let mut out = device.allocate::<i32>(4).context("allocating `out`")?;

    a.copy_from_slice(&[1, 2, 3, 4]);
    b.copy_from_slice(&[10, 20, 30, 40]);

    let add = device.compile(ADD, "add").context("compiling `add`")?;
    device
        .run(&add, &mut [&mut a, &mut b, &mut out])
        .context("running `add`")?;

    log::info!("{:?} + {:?} = {:?}", &*a, &*b, &*out);
    ensure!(*out == [11, 22, 33, 44], "unexpected result {:?}", &*out);

    Ok(())
}
