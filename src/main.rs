use std::{error::Error, path::PathBuf};

use clap::{Parser, ValueEnum};
use slice_volume::{
    ChannelSelector, FieldBuilder, LoadOptions, Orientation, RoundingRule, RowOrder,
    SliceSetLoader,
};

#[derive(Clone, Copy, ValueEnum)]
enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl From<Channel> for ChannelSelector {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Red => ChannelSelector::Red,
            Channel::Green => ChannelSelector::Green,
            Channel::Blue => ChannelSelector::Blue,
            Channel::Alpha => ChannelSelector::Alpha,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Rounding {
    HalfAwayFromZero,
    HalfToEven,
}

impl From<Rounding> for RoundingRule {
    fn from(rounding: Rounding) -> Self {
        match rounding {
            Rounding::HalfAwayFromZero => RoundingRule::HalfAwayFromZero,
            Rounding::HalfToEven => RoundingRule::HalfToEven,
        }
    }
}

/// Import an image slice stack and derive its volume fields
#[derive(Parser)]
#[command(name = "slice-volume", version, about)]
struct Args {
    /// Directory holding one image per slice
    source: PathBuf,

    /// Accepted slice file extension (repeatable)
    #[arg(short, long = "extension", default_value = "png")]
    extensions: Vec<String>,

    /// Color channel read as density
    #[arg(long, value_enum, default_value_t = Channel::Red)]
    channel: Channel,

    /// Tie-breaking rule when rounding to integer density
    #[arg(long, value_enum, default_value_t = Rounding::HalfAwayFromZero)]
    rounding: Rounding,

    /// Treat the last image row as y = 0
    #[arg(long)]
    bottom_up: bool,

    /// Write the center axial slice as a grayscale PNG
    #[arg(long)]
    preview: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let row_order = if args.bottom_up {
        RowOrder::BottomUp
    } else {
        RowOrder::TopDown
    };
    let options = LoadOptions::new()
        .with_extensions(&args.extensions)
        .with_channel(args.channel.into())
        .with_rounding(args.rounding.into())
        .with_row_order(row_order);

    let volume = SliceSetLoader::load_from_directory(&args.source, &options)?;
    let bounds = volume.bounds()?;
    let payload = FieldBuilder::new(&volume).build()?;

    log::info!(
        "{}: size {:?}, bounds ({}, {}), scale {:?}",
        volume.name(),
        payload.size,
        bounds.min,
        bounds.max,
        payload.scale
    );

    if let Some(path) = args.preview {
        let center = volume.size().2 / 2;
        if let Some(image) = volume.slice_image(center, Orientation::Axial) {
            image.save(&path)?;
            log::info!("Wrote slice {center} to {}", path.display());
        }
    }

    Ok(())
}
