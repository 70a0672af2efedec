mod config;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use dmg_emu_core::{
    GameBoy,
    cartridge::{self, Cartridge},
    input::Buttons,
    palette::Palette,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};

#[derive(Parser)]
#[command(name = "dmg-emu", about = "Headless DMG Game Boy emulator")]
struct Args {
    /// Path to ROM file
    rom: Option<PathBuf>,

    /// Path to boot ROM file (overrides the config file)
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Integer upscale factor for screenshots
    #[arg(long)]
    scale: Option<u32>,

    /// Display palette name (dmg, cyber, emu, autumn, paris, grayscale, early, crow, coffee, winter)
    #[arg(long)]
    palette: Option<String>,

    /// Log frames per second once a second
    #[arg(long)]
    fps: bool,

    /// Number of frames to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Button held for the whole run (a, b, select, start, right, left, up, down)
    #[arg(long, num_args = 1..)]
    hold: Vec<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,

    /// Reset and continue after an unknown opcode instead of exiting
    #[arg(long)]
    keep_going: bool,

    /// Print the cartridge header and exit
    #[arg(long)]
    info: bool,
}

fn init_logging(trace: bool) {
    let filter = if trace {
        "info,dmg_emu_core=trace"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

/// Largest screenshot upscale accepted.
const MAX_SCALE: u32 = 16;

fn resolve_scale(flag: Option<u32>, configured: u32) -> u32 {
    let requested = flag.unwrap_or(configured);
    let scale = requested.clamp(1, MAX_SCALE);
    if scale != requested {
        warn!("Scale {requested} out of range; using {scale}");
    }
    scale
}

fn parse_buttons(names: &[String]) -> Result<Buttons> {
    let mut buttons = Buttons::empty();
    for name in names {
        match Buttons::parse(name) {
            Some(b) => buttons |= b,
            None => bail!("unknown button '{name}'"),
        }
    }
    Ok(buttons)
}

fn load_cartridge(path: Option<&Path>) -> Cartridge {
    let Some(path) = path else {
        warn!("No ROM supplied; using a blank cartridge");
        return Cartridge::load(vec![0; cartridge::BLANK_ROM_SIZE]);
    };
    match Cartridge::from_file(path) {
        Ok(cart) => cart,
        Err(_) => Cartridge::load(cartridge::read_rom_or_blank(path)),
    }
}

fn frame_to_rgb(frame: &[u32], scale: u32) -> Vec<u8> {
    let scale = scale as usize;
    let width = SCREEN_WIDTH * scale;
    let mut out = Vec::with_capacity(width * SCREEN_HEIGHT * scale * 3);
    for row in frame.chunks_exact(SCREEN_WIDTH) {
        let mut line = Vec::with_capacity(width * 3);
        for &px in row {
            let rgb = Palette::rgb_bytes(px);
            for _ in 0..scale {
                line.extend_from_slice(&rgb);
            }
        }
        for _ in 0..scale {
            out.extend_from_slice(&line);
        }
    }
    out
}

fn write_screenshot(path: &Path, frame: &[u32], scale: u32) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating screenshot {}", path.display()))?;
    let w = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(
        w,
        SCREEN_WIDTH as u32 * scale,
        SCREEN_HEIGHT as u32 * scale,
    );
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().context("writing PNG header")?;
    writer
        .write_image_data(&frame_to_rgb(frame, scale))
        .context("writing PNG data")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.trace);

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let scale = resolve_scale(args.scale, cfg.scale);
    let palette = Palette::by_name_or_default(args.palette.as_deref().unwrap_or(&cfg.palette));
    let show_fps = args.fps || cfg.show_fps;
    let buttons = parse_buttons(&args.hold)?;

    let cart = load_cartridge(args.rom.as_deref());
    let header = cart.header_info();
    if args.info {
        print!("{header}");
        return Ok(());
    }
    info!("Cartridge header:\n{header}");

    let boot_rom = args
        .bootrom
        .or(cfg.boot_rom)
        .and_then(|path| cartridge::read_boot_rom(&path));

    let mut gb = GameBoy::new(cart, boot_rom, palette);
    if gb.is_blank() {
        warn!("Cartridge is blank; nothing will execute");
    }

    let start = Instant::now();
    let mut window_start = start;
    let mut window_frames = 0u32;
    let mut frame_count = 0u64;
    while frame_count < args.frames {
        if let Err(e) = gb.run_frame(buttons) {
            error!("{e}");
            error!("{}", gb.cpu.debug_state());
            if !args.keep_going {
                if let Err(e) = gb.mmu.save_cart_ram() {
                    warn!("Failed to write save RAM: {e}");
                }
                std::process::exit(1);
            }
            gb.reset();
        }
        frame_count += 1;

        if show_fps {
            window_frames += 1;
            let elapsed = window_start.elapsed().as_secs_f64();
            if elapsed >= 1.0 {
                info!("FPS: {:.1}", window_frames as f64 / elapsed);
                window_start = Instant::now();
                window_frames = 0;
            }
        }
    }
    info!(
        "Ran {frame_count} frames ({} LCD frames) in {:.2?}",
        gb.frames(),
        start.elapsed()
    );

    gb.mmu.save_cart_ram().context("writing save RAM")?;

    if let Some(path) = &args.screenshot {
        write_screenshot(path, gb.framebuffer(), scale)?;
        info!("Wrote screenshot to {}", path.display());
    }

    Ok(())
}
