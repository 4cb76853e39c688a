use dotenv::dotenv;
use hmilock::config::Config;
use hmilock::keys::KeypadKeys;
use hmilock::link::{CancelToken, Channel};
use hmilock::session::Session;
use hmilock::sim::ControlNode;
use hmilock_hal::GpioActiveLevel::Low;
use hmilock_hal::GpioBias::PullUp;
use hmilock_hal::GpioDriveMode::OpenDrain;
use hmilock_hal::gpiod::GpiodDriver;
use hmilock_hal::keypad::GpioKeypad;
use hmilock_hal::lcd::{CharacterLcd, GpioLcd, LcdGeometry};
use hmilock_hal::link::{ByteLink, ChannelLink, SerialLink};
use hmilock_hal::timer::ThreadTicker;
use hmilock_hal::GpioDriver;
use log::{debug, info, warn};
use std::env::var;
use sysinfo::System;
use time::OffsetDateTime;

fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre::eyre!("Invalid number of pins in {:?}", pin_str))
}

fn log_host() {
    const UNKNOWN_STR: &str = "???";

    info!(
        "Running on {} ({}), kernel {}, {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );
    let started = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    info!("Started at {}", started);
}

fn load_config() -> eyre::Result<Config> {
    debug!("Trying to load config from {:?}...", Config::path());
    if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        return Ok(config);
    }
    info!("Config not found. Using default");
    let config = Config::default();
    config.save()?;
    info!("Default config saved.");
    Ok(config)
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    info!("HmiLock v{} starting...", env!("CARGO_PKG_VERSION"));
    log_host();

    let config = load_config()?;
    debug!("{:?}", config);

    // Get pin numbers from env
    let chip_path = var("HMILOCK_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let lcd_e_pin_no: usize = var("HMILOCK_LCD_PIN_E")?.parse()?;
    let lcd_rs_pin_no: usize = var("HMILOCK_LCD_PIN_RS")?.parse()?;
    let lcd_data_pin_nos = parse_pin_bus(&var("HMILOCK_LCD_PINS_DATA")?)?;
    let keypad_pin_col_nos = parse_pin_bus(&var("HMILOCK_KEYPAD_PINS_COLS")?)?;
    let keypad_pin_row_nos = parse_pin_bus(&var("HMILOCK_KEYPAD_PINS_ROWS")?)?;

    info!("LCD @ E: {}, RS: {}, Data: {:?}", lcd_e_pin_no, lcd_rs_pin_no, lcd_data_pin_nos);
    info!("Keypad @ Cols: {:?}, Rows: {:?}", keypad_pin_col_nos, keypad_pin_row_nos);

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip_path)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let mut lcd_e_pin = gpio.get_pin(lcd_e_pin_no)?;
    let lcd_e_out = lcd_e_pin.as_output()?;
    let mut lcd_rs_pin = gpio.get_pin(lcd_rs_pin_no)?;
    let lcd_rs_out = lcd_rs_pin.as_output()?;
    let mut lcd_data_bus = gpio.get_pin_bus(lcd_data_pin_nos)?;
    let lcd_data_out = lcd_data_bus.as_output()?;
    let mut lcd = GpioLcd::new_4bit(&*lcd_e_out, &*lcd_rs_out, &*lcd_data_out, LcdGeometry::LCD_16X2);
    lcd.init()?;
    debug!("{:?} initialized.", lcd);

    debug!("Initializing keypad driver...");
    let mut keypad_col_bus = gpio.get_pin_bus(keypad_pin_col_nos)?;
    let mut keypad_row_bus = gpio.get_pin_bus(keypad_pin_row_nos)?;
    keypad_col_bus.set_drive_mode(OpenDrain);
    keypad_col_bus.set_active_level(Low);
    keypad_row_bus.set_bias(PullUp);
    keypad_row_bus.set_active_level(Low);
    let keypad_col_out = keypad_col_bus.as_output()?;
    let keypad_row_in = keypad_row_bus.as_input()?;
    let keypad = GpioKeypad::new(&*keypad_col_out, &*keypad_row_in);
    debug!("{:?} initialized.", keypad);

    let mut keys = KeypadKeys::new(&keypad, config.timing.debounce());
    let mut ticker = ThreadTicker::new();
    let cancel = CancelToken::new();

    let control_mode = var("HMILOCK_CONTROL").unwrap_or_else(|_| "serial".to_string());
    let (mut link, control): (Box<dyn ByteLink>, _) = match control_mode.as_str() {
        "serial" => {
            let port = var("HMILOCK_SERIAL_PORT").unwrap_or_else(|_| "/dev/serial0".to_string());
            let baud: u32 = match var("HMILOCK_SERIAL_BAUD") {
                Ok(baud) => baud.parse()?,
                Err(_) => 9600,
            };
            info!("Control node @ {} ({} baud)", port, baud);
            (Box::new(SerialLink::open(&port, baud)?) as Box<dyn ByteLink>, None)
        }
        "sim" => {
            info!("Control node simulated in-process.");
            let (hmi_end, control_end) = ChannelLink::pair();
            let node = ControlNode::new().spawn(control_end, config.channel_timing(), cancel.clone())?;
            (Box::new(hmi_end) as Box<dyn ByteLink>, Some(node))
        }
        other => eyre::bail!("Unknown HMILOCK_CONTROL mode {:?}, expected serial or sim", other),
    };

    info!("HmiLock initialized.");

    let channel = Channel::new(&mut *link, config.link.wait_policy(), cancel.clone(), config.channel_timing());
    let mut session = Session::new(&config, &mut lcd, &mut keys, &mut ticker, channel);
    let result = session.run();
    drop(session);

    cancel.cancel();
    if let Some(node) = control {
        drop(link);
        match node.join() {
            Ok(Ok(node)) => info!("Simulated control node: {:?}", node.stats()),
            Ok(Err(err)) => warn!("Simulated control node failed: {}", err),
            Err(_) => warn!("Simulated control node panicked."),
        }
    }

    result?;
    Ok(())
}
