//! Dispatch overhead on a warm kernel cache

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use cudajit::driver::SymbolTable;
use cudajit::{
    Api, ApiVersion, ArgType, KernelArg, LaunchConfig, Launcher, MethodTable, ScalarKind,
    SimulatedDriver,
};

fn launcher(driver: &SimulatedDriver) -> Launcher<&SimulatedDriver, MethodTable> {
    let mut methods = MethodTable::new();
    methods.register(
        "saxpy",
        vec![
            ArgType::Scalar(ScalarKind::F32),
            ArgType::RawPtr(ScalarKind::F32),
            ArgType::RawPtr(ScalarKind::F32),
        ],
        "saxpy_f32",
        ".visible .entry saxpy_f32() { ret; }",
    );
    Launcher::new(Api::with_version(driver, driver.version()), methods)
}

fn bench_cached_launch(c: &mut Criterion) {
    let driver = SimulatedDriver::new(ApiVersion::new(10, 2));
    let launcher = launcher(&driver);
    let config = LaunchConfig::new_1d(256, 256);
    let args = [
        KernelArg::from(2.0f32),
        KernelArg::array(ScalarKind::F32, 0x1000, &[65536]),
        KernelArg::array(ScalarKind::F32, 0x2000, &[65536]),
    ];
    launcher.launch(&config, "saxpy", &args).unwrap();

    c.bench_function("cached_launch", |b| {
        b.iter(|| {
            launcher.launch(&config, "saxpy", black_box(&args)).unwrap();
            driver.clear();
        })
    });
}

fn bench_symbol_table(c: &mut Criterion) {
    c.bench_function("symbol_table_build", |b| {
        b.iter(|| SymbolTable::for_version(black_box(ApiVersion::new(10, 2))))
    });

    let table = SymbolTable::for_version(ApiVersion::new(10, 2));
    c.bench_function("symbol_resolve", |b| {
        b.iter(|| table.resolve(black_box("cuMemcpyHtoDAsync")).unwrap().len())
    });
}

criterion_group!(benches, bench_cached_launch, bench_symbol_table);
criterion_main!(benches);
