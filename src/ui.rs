use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use eframe::egui::{self};
use egui_modal::Modal;

use crate::display;
use crate::hub::{SampleRate, SubscriptionManager};
use crate::location::LocationFetcher;
use crate::serial_hub::{SerialHub, BAUD_RATES};
use crate::state::{ScreenState, SensorKind, StateEvent};

const NO_DEVICE_MSG: &str =
    "Oops, no sensor board is attached. This will not work without one. Plug it in and restart!";

pub fn init() -> eframe::Result {
    env_logger::init();
    let options = eframe::NativeOptions {
        // portrait, locked: the screen is laid out for one orientation only
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 780.0])
            .with_resizable(false),
        ..Default::default()
    };
    eframe::run_native(
        "Multi Sensor",
        options,
        Box::new(|_cc| Ok(Box::new(SensorApp::new()))),
    )
}

struct Session {
    hub: SerialHub,
    manager: SubscriptionManager,
    events: Receiver<StateEvent>,
}

impl Session {
    fn open(port_name: &str, baud_rate: u32, share_location: bool) -> tokio_serial::Result<Self> {
        let hub = SerialHub::open(port_name, baud_rate, share_location)?;
        let (tx, rx) = channel();

        let locator = LocationFetcher::new(Arc::new(hub.location()), tx.clone());
        let mut manager = SubscriptionManager::new(
            Box::new(hub.sensor(SensorKind::Magnetometer)),
            Box::new(hub.sensor(SensorKind::Accelerometer)),
            Box::new(hub.sensor(SensorKind::Gyroscope)),
            Box::new(hub.sensor(SensorKind::DeviceMotion)),
            tx,
            locator.clone(),
        );

        locator.refresh();
        manager.subscribe();
        manager.set_rate(SampleRate::Slow);

        Ok(Self {
            hub,
            manager,
            events: rx,
        })
    }
}

struct SensorApp {
    serial_port_info: Option<tokio_serial::SerialPortInfo>,
    baud_rate: u32,
    share_location: bool,
    session: Option<Session>,
    state: ScreenState,
    no_device: bool,
    device_checked: bool,
}

impl SensorApp {
    fn new() -> Self {
        let no_device = tokio_serial::available_ports()
            .map(|ports| ports.is_empty())
            .unwrap_or(true);
        let mut state = ScreenState::default();
        if no_device {
            state.apply(StateEvent::Fault(NO_DEVICE_MSG.to_string()));
        }

        Self {
            serial_port_info: None,
            baud_rate: 115200,
            share_location: true,
            session: None,
            state,
            no_device,
            device_checked: false,
        }
    }

    fn link_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(session) = &self.session {
                let port_name = session.hub.port_name().to_string();
                ui.label(format!("'{port_name}' 8-N-1"));
                if ui.button("Close").clicked() {
                    self.session.take();
                }
                return;
            }

            egui::ComboBox::new("ports", "Port")
                .selected_text(self.serial_port_info.as_ref().map_or("", |p| &p.port_name))
                .show_ui(ui, |ui| {
                    for port in tokio_serial::available_ports().unwrap_or_default() {
                        // remove /dev/ttySx.
                        if port.port_name.contains("/dev/ttyS") {
                            continue;
                        }

                        let port_name = port.port_name.clone();
                        ui.selectable_value(
                            &mut self.serial_port_info,
                            Some(port),
                            port_name.clone(),
                        );
                    }
                });

            egui::ComboBox::new("baudrates", "Baud rate")
                .selected_text(format!("{}", self.baud_rate))
                .show_ui(ui, |ui| {
                    for baud_rate in BAUD_RATES {
                        ui.selectable_value(&mut self.baud_rate, baud_rate, format!("{baud_rate}"));
                    }
                });

            ui.checkbox(&mut self.share_location, "Share location");

            if let Some(serial_port_info) = &self.serial_port_info {
                if ui.button("Open").clicked() {
                    match Session::open(
                        &serial_port_info.port_name,
                        self.baud_rate,
                        self.share_location,
                    ) {
                        Ok(session) => {
                            self.state = ScreenState::default();
                            self.session = Some(session);
                        }
                        Err(e) => {
                            log::warn!("open {} failed: {e}", serial_port_info.port_name);
                            self.state
                                .apply(StateEvent::Fault(format!("could not open port: {e}")));
                        }
                    }
                }
            }
        });
    }

    fn sensor_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Magnetometer:");
        axis_grid(ui, "mag", self.state.mag.field.into());

        ui.heading("Accelerometer:");
        axis_grid(ui, "acc", self.state.acc.lin_acc.into());

        ui.heading("Gyroscope:");
        axis_grid(ui, "gyro", self.state.gyro.ang_vel.into());

        ui.heading("Rotation:");
        let rotation = &self.state.rotation;
        egui::Grid::new("rotation")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                ui.strong("yaw (rate)");
                ui.strong("pitch (rate)");
                ui.strong("roll (rate)");
                ui.end_row();
                ui.label(display::round_axis(rotation.yaw).to_string());
                ui.label(display::round_axis(rotation.pitch).to_string());
                ui.label(display::round_axis(rotation.roll).to_string());
                ui.end_row();
                ui.label(display::round_axis(rotation.yaw_rate).to_string());
                ui.label(display::round_axis(rotation.pitch_rate).to_string());
                ui.label(display::round_axis(rotation.roll_rate).to_string());
                ui.end_row();
            });

        ui.heading("Location:");
        let readout =
            display::location_readout(self.state.fix.as_ref(), self.state.error.as_deref());
        egui::Grid::new("location_a")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                ui.strong("Accuracy");
                ui.strong("Speed");
                ui.strong("Heading");
                ui.end_row();
                ui.label(&readout.accuracy);
                ui.label(&readout.speed);
                ui.label(&readout.heading);
                ui.end_row();
            });
        egui::Grid::new("location_b")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                ui.strong("Altitude");
                ui.strong("Lat");
                ui.strong("Lng");
                ui.end_row();
                ui.label(&readout.altitude);
                ui.label(&readout.latitude);
                ui.label(&readout.longitude);
                ui.end_row();
            });

        ui.heading("Orientation:");
        ui.label(self.state.orientation.value.to_string());

        ui.label(&readout.status);
    }
}

fn axis_grid(ui: &mut egui::Ui, id: &str, [x, y, z]: [f64; 3]) {
    egui::Grid::new(id)
        .num_columns(3)
        .striped(true)
        .show(ui, |ui| {
            ui.strong("x-axis");
            ui.strong("y-axis");
            ui.strong("z-axis");
            ui.end_row();
            ui.label(display::round_axis(x).to_string());
            ui.label(display::round_axis(y).to_string());
            ui.label(display::round_axis(z).to_string());
            ui.end_row();
        });
}

impl eframe::App for SensorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(session) = &mut self.session {
            while let Ok(event) = session.events.try_recv() {
                self.state.apply(event);
            }
        }

        let modal_no_device = Modal::new(ctx, "device_check");
        modal_no_device.show(|ui| {
            modal_no_device.title(ui, "No sensors found");
            modal_no_device.frame(ui, |ui| {
                modal_no_device.body(ui, NO_DEVICE_MSG);
            });
            modal_no_device.buttons(ui, |ui| {
                if modal_no_device.caution_button(ui, "close").clicked() {
                    // After clicking, the modal is automatically closed
                };
            });
        });
        if !self.device_checked {
            self.device_checked = true;
            if self.no_device {
                modal_no_device.open();
            }
        }

        egui::TopBottomPanel::top("link_panel").show(ctx, |ui| {
            self.link_panel(ui);
        });

        egui::TopBottomPanel::bottom("buttons").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(session) = &mut self.session {
                    if ui.button("Toggle").clicked() {
                        session.manager.toggle();
                    }
                    if ui.button("Slow").clicked() {
                        session.manager.set_rate(SampleRate::Slow);
                    }
                    if ui.button("Fast").clicked() {
                        session.manager.set_rate(SampleRate::Fast);
                    }
                } else {
                    ui.label("no sensor link");
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.sensor_screen(ui);
        });

        ctx.request_repaint();
    }
}
