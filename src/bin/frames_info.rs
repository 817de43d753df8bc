use std::env;

use anyhow::{bail, Context};
use ndframes::backends::raw_stack::RawLayout;
use ndframes::{OpenOptions, PixelType};

const USE_MESSAGE : &str = "\x1b[31mUsage: frames_info <path> \
    [-i <identifiers>] [-e <extension>] [-b <backend>] [-p <pixel type>] \
    [--iter <axes>] [--bundle <axes>] [--raw <y>,<x>,<type>[,<header>[,<gap>]]] \
    [--parallel [-j <chunk size>]] [-n <frame>]\x1b[0m";

/// Splits `"t,z"` (or `"tz"` when every axis is one letter) into axis names
fn parse_axes(arg : &str) -> Vec<String> {
    if arg.contains(',') {
        arg.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect()
    } else {
        arg.chars().map(|c| c.to_string()).collect()
    }
}

fn parse_raw_layout(arg : &str) -> anyhow::Result<RawLayout> {
    let parts : Vec<&str> = arg.split(',').collect();
    if parts.len() < 3 {
        bail!("--raw needs at least <y>,<x>,<type>");
    }
    let ydim = parts[0].parse().context("raw y size")?;
    let xdim = parts[1].parse().context("raw x size")?;
    let pixel_type = PixelType::from_string_slice(parts[2])
        .with_context(|| format!("unknown pixel type '{}'", parts[2]))?;

    let mut layout = RawLayout::new(ydim, xdim, pixel_type);
    if let Some(header) = parts.get(3) {
        layout = layout.with_header(header.parse().context("raw header bytes")?);
    }
    if let Some(gap) = parts.get(4) {
        layout = layout.with_gap(gap.parse().context("raw gap bytes")?);
    }
    Ok(layout)
}

/// Prints a summary of a dataset and, optionally, reads one frame.
///
/// # Example
///
/// ```text
/// frames_info data/cells/ -e png --iter t --bundle z -n 0
/// frames_info stack.raw --raw 512,512,u16,1024 --parallel
/// ```
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args : Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("{}", USE_MESSAGE);
    }
    let path = &args[1];

    let mut options = OpenOptions::default();
    let mut iter_axes = None;
    let mut bundle_axes = None;
    let mut frame_no : Option<i64> = None;

    let mut rest = args.iter().skip(2);
    while let Some(arg) = rest.next() {
        let mut value = || rest.next().with_context(|| format!("{} needs a value\n{}", arg, USE_MESSAGE));
        match arg.as_str() {
            "-i" => options = options.with_dim_identifiers(&parse_axes(value()?)),
            "-e" => options = options.with_extension(value()?),
            "-b" => options = options.with_backend(value()?),
            "-p" => {
                let name = value()?;
                let pixel_type = PixelType::from_string_slice(name)
                    .with_context(|| format!("unknown pixel type '{}'", name))?;
                options = options.with_pixel_type(pixel_type);
            },
            "-j" => options = options.with_chunk_size(value()?.parse().context("chunk size")?),
            "-n" => frame_no = Some(value()?.parse().context("frame number")?),
            "--iter" => iter_axes = Some(parse_axes(value()?)),
            "--bundle" => bundle_axes = Some(parse_axes(value()?)),
            "--raw" => options = options.with_raw_layout(parse_raw_layout(value()?)?),
            "--parallel" => options = options.with_parallel(true),
            other => bail!("unknown argument '{}'\n{}", other, USE_MESSAGE),
        }
    }

    let mut frames = ndframes::open_with(path, &options)
        .with_context(|| format!("opening {}", path))?;
    if let Some(axes) = iter_axes {
        frames.set_iter_axes(&axes)?;
    }
    if let Some(axes) = bundle_axes {
        frames.set_bundle_axes(&axes)?;
    }
    println!("{}", frames);

    if let Some(i) = frame_no {
        let frame = frames.get_frame(i)?;
        println!("Frame {} at {:?}: shape {:?}, {}", frame.frame_no, frame.coords, frame.shape(), frame.pixel_type());
        for (key, field) in &frame.metadata {
            println!("  {}: {:?}", key, field);
        }
    }
    Ok(())
}
