use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pixelpass::{
    init_logging, ElementKind, LoggingConfig, Renderer, RendererInit, ShaderSource,
};

const USAGE: &str = "\
Usage: pixelpass-cli <shader.wgsl> [options]

Renders the fragment shader offscreen and writes the result as a PNG.

Options:
  --size WxH      output size in pixels (default 512x512)
  --frames N      frames to render before each readback (default 1)
  --accumulate    sum the frames additively into a float target
  --watch         keep rendering once per second, rewriting the output;
                  edits to the shader file are picked up on the fly
  -o FILE         output path (default out.png)
  -h, --help      print this help
";

struct Args {
    shader: PathBuf,
    width: u32,
    height: u32,
    frames: u32,
    accumulate: bool,
    watch: bool,
    out: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut shader = None;
    let mut width = 512u32;
    let mut height = 512u32;
    let mut frames = 1u32;
    let mut accumulate = false;
    let mut watch = false;
    let mut out = PathBuf::from("out.png");

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--size" => {
                let value = args.next().context("--size needs a value")?;
                let (w, h) = value
                    .split_once(['x', 'X'])
                    .context("--size needs WxH, e.g. 640x480")?;
                width = w.parse().context("bad width")?;
                height = h.parse().context("bad height")?;
            }
            "--frames" => {
                frames = args
                    .next()
                    .context("--frames needs a count")?
                    .parse()
                    .context("bad frame count")?;
            }
            "--accumulate" => accumulate = true,
            "--watch" => watch = true,
            "-o" => out = PathBuf::from(args.next().context("-o needs a path")?),
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other if shader.is_none() && !other.starts_with('-') => {
                shader = Some(PathBuf::from(other));
            }
            other => bail!("unrecognized argument {other}\n{USAGE}"),
        }
    }

    Ok(Args {
        shader: shader.with_context(|| format!("missing shader path\n{USAGE}"))?,
        width,
        height,
        frames: frames.max(1),
        accumulate,
        watch,
        out,
    })
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let args = parse_args()?;

    // Accumulation needs a blendable target, so those runs render float and
    // get tone-mapped on write; plain runs render bytes directly.
    let kind = if args.accumulate {
        ElementKind::F32
    } else {
        ElementKind::U8
    };
    let init = RendererInit::new(
        args.width,
        args.height,
        4,
        kind,
        ShaderSource::File(args.shader.clone()),
    );
    let mut renderer = Renderer::new(init).context("renderer configuration")?;
    renderer.start().context("renderer startup")?;
    renderer.set_accumulate(args.accumulate);

    log::info!(
        "rendering {} at {}x{}",
        args.shader.display(),
        args.width,
        args.height
    );

    loop {
        for _ in 0..args.frames {
            renderer.render().context("render")?;
        }
        write_png(&mut renderer, &args.out)?;
        log::info!("wrote {}", args.out.display());

        if !args.watch {
            break;
        }
        std::thread::sleep(Duration::from_secs(1));
        if args.accumulate {
            // Restart the sum so every output is a fresh N-frame pass.
            renderer.set_accumulate(true);
        }
    }
    Ok(())
}

fn write_png(renderer: &mut Renderer, path: &Path) -> Result<()> {
    let rgba: Vec<u8> = match renderer.kind() {
        ElementKind::U8 => {
            let mut out = vec![0u8; renderer.element_count()];
            renderer.read_into(&mut out).context("readback")?;
            out
        }
        _ => renderer
            .read_with(|pixels: &[f32]| {
                pixels
                    .iter()
                    .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
                    .collect()
            })
            .context("readback")?,
    };
    image::save_buffer(
        path,
        &rgba,
        renderer.width(),
        renderer.height(),
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("writing {}", path.display()))
}
