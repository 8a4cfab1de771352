#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

mod display;
mod hub;
mod location;
mod serial_hub;
mod state;
mod ui;

use tokio::time::Duration;

fn main() {
    let rt = tokio::runtime::Runtime::new().expect("Unable to create Runtime");
    let handle = rt.handle().clone();
    let _enter = handle.enter();

    std::thread::spawn(move || {
        rt.block_on(async {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        })
    });

    ui::init().unwrap();
}
