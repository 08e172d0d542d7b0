#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::cell::RefCell;

use defmt::{Debug2Format, error, info, warn};
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_sync::{
    blocking_mutex::{Mutex, raw::CriticalSectionRawMutex},
    channel::Channel,
    signal::Signal,
};
use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_hal::{
    Blocking,
    clock::CpuClock,
    delay::Delay,
    gpio::{Input, InputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    time::Rate,
    timer::timg::TimerGroup,
};
use esp_println as _;
use esp_storage::FlashStorage;
use ssd1306::{I2CDisplayInterface, Ssd1306, mode::BufferedGraphicsMode, prelude::*};

use esp32_tire_gauge::{
    bmp280::{Bmp280, registers::BMP280_ADDR_PRIMARY},
    config::GaugeConfig,
    controller::{
        ButtonEvent, ButtonTiming, ButtonType, Effect, Screen, SensorData, SystemController,
    },
    display,
    persist::CalibrationStore,
    smp3011::{
        Smp3011,
        calibration::{LinearCalibration, SharedCalibration},
        registers::CONVERSION_DELAY_MS,
    },
};

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type SensorBus = I2c<'static, Blocking>;
type SensorDevice = I2cDevice<'static, CriticalSectionRawMutex, SensorBus>;
type Calibration = SharedCalibration<CriticalSectionRawMutex>;
type Oled = Ssd1306<
    I2CInterface<I2c<'static, Blocking>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

type ButtonChannel = Channel<CriticalSectionRawMutex, ButtonEvent, 4>;
type ReadingChannel = Channel<CriticalSectionRawMutex, SensorData, 2>;
type ScreenSignal = Signal<CriticalSectionRawMutex, Screen>;

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let gauge = GaugeConfig::new();

    // Stored calibration, falling back to the default span
    let mut store = CalibrationStore::new(
        FlashStorage::new(peripherals.FLASH),
        gauge.calibration_flash_offset,
    );
    let stored = store.load().unwrap_or_else(|e| {
        error!("Calibration read failed: {}", Debug2Format(&e));
        None
    });
    let model = stored.unwrap_or_else(|| {
        LinearCalibration::new(gauge.default_min_kpa, gauge.default_max_kpa).unwrap_or_default()
    });
    let calibration: &'static Calibration = mk_static!(Calibration, Calibration::new(model));

    // I2C1: BMP280 + SMP3011 on one bus
    let sensor_i2c = I2c::new(
        peripherals.I2C1,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .expect("Failed to configure sensor I2C bus")
    .with_sda(peripherals.GPIO33)
    .with_scl(peripherals.GPIO32);
    let sensor_bus: &'static Mutex<CriticalSectionRawMutex, RefCell<SensorBus>> = mk_static!(
        Mutex<CriticalSectionRawMutex, RefCell<SensorBus>>,
        Mutex::new(RefCell::new(sensor_i2c))
    );
    let bmp = Bmp280::new(
        I2cDevice::new(sensor_bus),
        Delay::new(),
        gauge.bmp280_addr == BMP280_ADDR_PRIMARY,
    );
    let smp = Smp3011::new(
        I2cDevice::new(sensor_bus),
        Delay::new(),
        gauge.smp3011_addr,
        calibration,
    );

    // I2C0: OLED on its own bus
    let oled_i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("Failed to configure display I2C bus")
    .with_sda(peripherals.GPIO5)
    .with_scl(peripherals.GPIO4);
    let oled = Ssd1306::new(
        I2CDisplayInterface::new_custom_address(oled_i2c, gauge.display_addr),
        DisplaySize128x64,
        DisplayRotation::Rotate0,
    )
    .into_buffered_graphics_mode();

    // Buttons are active low
    let pull_up = InputConfig::default().with_pull(Pull::Up);
    let up = Input::new(peripherals.GPIO26, pull_up);
    let down = Input::new(peripherals.GPIO27, pull_up);
    let mode = Input::new(peripherals.GPIO25, pull_up);

    let controller = SystemController::new(&gauge, calibration);

    let buttons: &'static ButtonChannel = mk_static!(ButtonChannel, Channel::new());
    let readings: &'static ReadingChannel = mk_static!(ReadingChannel, Channel::new());
    let screen: &'static ScreenSignal = mk_static!(ScreenSignal, Signal::new());

    spawner.spawn(display_task(oled, screen).expect("display task"));
    spawner.spawn(
        controller_task(controller, store, buttons, readings, screen).expect("controller task"),
    );
    spawner.spawn(
        button_task(
            [up, down, mode],
            gauge.button_timing,
            gauge.button_poll_ms,
            buttons,
        )
        .expect("button task"),
    );
    spawner.spawn(sensor_task(bmp, smp, gauge.read_interval_ms, readings).expect("sensor task"));

    loop {
        Timer::after_secs(1).await;
    }
}

#[embassy_executor::task]
async fn sensor_task(
    mut bmp: Bmp280<SensorDevice, Delay>,
    mut smp: Smp3011<'static, SensorDevice, Delay, CriticalSectionRawMutex>,
    interval_ms: u64,
    readings: &'static ReadingChannel,
) {
    info!("'sensor_task' has been started");

    let mut ticker = Ticker::every(Duration::from_millis(interval_ms));
    loop {
        // A sensor that was absent at boot is picked up once it answers
        if let Err(e) = bmp.ensure_initialized() {
            error!("BMP280 initialization failed: {:?}", e);
        }
        if !smp.is_initialized() {
            match smp.init() {
                Ok(()) => {
                    if let Err(e) = smp.dump_registers() {
                        warn!("SMP3011 register dump failed: {:?}", e);
                    }
                }
                Err(e) => error!("SMP3011 initialization failed: {:?}", e),
            }
        }

        let (temperature_c, atmospheric_hpa) = match bmp.read_data() {
            Ok(m) => (Some(m.temperature_c), m.pressure_hpa),
            Err(e) => {
                warn!("BMP280 read failed: {:?}", e);
                (None, None)
            }
        };
        let tire = match smp.start_measurement() {
            Ok(()) => {
                Timer::after_millis(u64::from(CONVERSION_DELAY_MS)).await;
                smp.fetch_pressure_detailed()
            }
            Err(e) => Err(e),
        };
        let (tire_kpa, tire_raw) = match tire {
            Ok((kpa, raw)) => (Some(kpa), Some(raw)),
            Err(e) => {
                warn!("SMP3011 read failed: {:?}", e);
                (None, None)
            }
        };

        readings
            .send(SensorData {
                temperature_c,
                atmospheric_hpa,
                tire_kpa,
                tire_raw,
                timestamp_ms: Instant::now().as_millis(),
            })
            .await;
        ticker.next().await;
    }
}

/// Polls the buttons (Up, Down, Mode) and reports each press on release.
#[embassy_executor::task]
async fn button_task(
    pins: [Input<'static>; 3],
    timing: ButtonTiming,
    poll_ms: u64,
    events: &'static ButtonChannel,
) {
    info!("'button_task' has been started");
    const KINDS: [ButtonType; 3] = [ButtonType::Up, ButtonType::Down, ButtonType::Mode];
    let mut pressed_at: [Option<u64>; 3] = [None; 3];

    loop {
        let now = Instant::now().as_millis();
        for ((button, pin), pressed) in KINDS.iter().zip(pins.iter()).zip(pressed_at.iter_mut()) {
            match (pin.is_low(), *pressed) {
                (true, None) => *pressed = Some(now),
                (false, Some(since)) => {
                    *pressed = None;
                    let event = ButtonEvent {
                        button: *button,
                        press: timing.classify(now.saturating_sub(since)),
                        timestamp_ms: now,
                    };
                    events.send(event).await;
                }
                _ => {}
            }
        }
        Timer::after_millis(poll_ms).await;
    }
}

#[embassy_executor::task]
async fn controller_task(
    mut controller: SystemController<'static, CriticalSectionRawMutex>,
    mut store: CalibrationStore<FlashStorage<'static>>,
    buttons: &'static ButtonChannel,
    readings: &'static ReadingChannel,
    screen: &'static ScreenSignal,
) {
    info!("'controller_task' has been started");
    screen.signal(controller.screen());

    loop {
        match select(buttons.receive(), readings.receive()).await {
            Either::First(event) => match controller.handle_event(event) {
                Effect::None => continue,
                Effect::Redraw => {}
                Effect::SaveCalibration(model) => {
                    if let Err(e) = store.save(&model) {
                        error!("Calibration write failed: {}", Debug2Format(&e));
                    }
                }
            },
            Either::Second(data) => controller.update_readings(data),
        }
        screen.signal(controller.screen());
    }
}

#[embassy_executor::task]
async fn display_task(mut oled: Oled, screens: &'static ScreenSignal) {
    info!("'display_task' has been started");
    if let Err(e) = oled.init() {
        error!("Display initialization failed: {}", Debug2Format(&e));
        return;
    }

    loop {
        let screen = screens.wait().await;
        let result = display::draw(&mut oled, &screen).and_then(|()| oled.flush());
        if let Err(e) = result {
            warn!("Display update failed: {}", Debug2Format(&e));
        }
    }
}
