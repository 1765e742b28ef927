//! fragkv CLI
//!
//! Create, fill and inspect maps from the command line.

use clap::{Parser, Subcommand};
use fragkv::{
    Attribute, CellValNum, Config, Context, Datatype, Item, KeyFilter, MapError, MapSchema,
    Result, Store, TypedBuffer, Value,
};
use tracing_subscriber::{fmt, EnvFilter};

/// fragkv CLI
#[derive(Parser, Debug)]
#[command(name = "fragkv")]
#[command(about = "Buffered, typed key-value maps over fragment storage")]
#[command(version)]
struct Args {
    /// Map directory
    #[arg(short, long)]
    uri: String,

    /// Staged items before an implicit flush (0 = flush on exit only)
    #[arg(short, long, default_value = "0")]
    max_buffered: u64,

    /// Skip fsync on flush
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new map
    Create {
        /// Attribute as name:type[:count|var], e.g. score:float64 or tags:char:var
        #[arg(short, long = "attr", required = true)]
        attrs: Vec<String>,
    },

    /// Store one item
    Put {
        /// The key
        #[arg(short, long)]
        key: String,

        /// Datatype of the key
        #[arg(short = 't', long, default_value = "int64")]
        key_type: Datatype,

        /// Attribute value as name=value (numbers comma separated)
        #[arg(short, long = "attr", required = true)]
        attrs: Vec<String>,
    },

    /// Print one item
    Get {
        /// The key
        #[arg(short, long)]
        key: String,

        /// Datatype of the key
        #[arg(short = 't', long, default_value = "int64")]
        key_type: Datatype,
    },

    /// Print every item, optionally only keys of one scalar type
    List {
        /// Only keys of this datatype (one element, any length for char)
        #[arg(short = 't', long)]
        key_type: Option<Datatype>,
    },

    /// Merge all fragments into one
    Consolidate,

    /// Print the schema
    Schema,
}

fn main() {
    // Initialize tracing/logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,fragkv=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = Config::builder()
        .max_buffered_items(args.max_buffered)
        .sync_on_flush(!args.no_sync)
        .build();
    let ctx = Context::new(config);

    if let Err(e) = run(&ctx, &args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(ctx: &Context, args: &Args) -> Result<()> {
    let uri = args.uri.as_str();
    match &args.command {
        Commands::Create { attrs } => {
            let mut builder = MapSchema::builder();
            for spec in attrs {
                builder = builder.attribute(parse_attribute(spec)?);
            }
            let mut store = Store::create(ctx, uri, &builder.build())?;
            store.close()?;
            println!("created {}", uri);
        }

        Commands::Put {
            key,
            key_type,
            attrs,
        } => {
            let mut store = Store::open(ctx, uri)?;
            let mut item = Item::from_key_buffer(parse_key(*key_type, key)?);

            for pair in attrs {
                let (name, text) = pair.split_once('=').ok_or_else(|| {
                    MapError::UnknownAttribute(format!("'{}' is not name=value", pair))
                })?;
                let attr = store
                    .schema()
                    .attribute(name)
                    .ok_or_else(|| MapError::UnknownAttribute(name.to_string()))?;
                let value = Value::parse(attr.datatype(), text)?.to_buffer(attr.cell_val_num())?;
                item.set_buffer(name, value)?;
            }

            store.add_item(&item)?;
            store.close()?;
        }

        Commands::Get { key, key_type } => {
            let store = Store::open(ctx, uri)?;
            let key = parse_key(*key_type, key)?;
            match store.get_item_by_buffer(&key) {
                Ok(item) => print_item(&item)?,
                Err(MapError::KeyNotFound) => println!("not found"),
                Err(e) => return Err(e),
            }
        }

        Commands::List { key_type } => {
            let store = Store::open(ctx, uri)?;
            let mut iter = store.iter()?;
            if let Some(datatype) = key_type {
                iter.set_filter(Some(key_filter(*datatype)));
            }
            let mut count = 0usize;
            for item in iter {
                print_item(&item?)?;
                count += 1;
            }
            println!("({} items)", count);
        }

        Commands::Consolidate => {
            Store::consolidate(ctx, uri)?;
            println!("consolidated {}", uri);
        }

        Commands::Schema => {
            let store = Store::open(ctx, uri)?;
            for attr in store.schema().attributes() {
                println!("{}: {} ({})", attr.name(), attr.datatype(), attr.cell_val_num());
            }
        }
    }
    Ok(())
}

/// "name:type[:count|var]"
fn parse_attribute(spec: &str) -> Result<Attribute> {
    let mut parts = spec.split(':');
    let name = parts.next().unwrap_or_default();
    let datatype: Datatype = parts
        .next()
        .ok_or_else(|| MapError::InvalidSchema(format!("'{}' has no type", spec)))?
        .parse()?;

    let cell_val_num = match parts.next() {
        None if datatype == Datatype::Char => CellValNum::Var,
        None => CellValNum::Fixed(1),
        Some("var") => CellValNum::Var,
        Some(count) => CellValNum::Fixed(count.parse().map_err(|_| {
            MapError::InvalidSchema(format!("'{}' is not an element count", count))
        })?),
    };

    Ok(Attribute::new(name, datatype, cell_val_num))
}

/// Keys are scalars, or strings for `char`
fn parse_key(datatype: Datatype, text: &str) -> Result<TypedBuffer> {
    let cell_val_num = match datatype {
        Datatype::Char => CellValNum::Var,
        _ => CellValNum::Fixed(1),
    };
    Value::parse(datatype, text)?.to_buffer(cell_val_num)
}

fn key_filter(datatype: Datatype) -> KeyFilter {
    match datatype {
        Datatype::Char => KeyFilter::new(datatype, CellValNum::Var),
        _ => KeyFilter::new(datatype, CellValNum::Fixed(1)),
    }
}

fn print_item(item: &Item) -> Result<()> {
    println!("{}", Value::from_buffer(item.key_buffer())?);
    for name in item.attribute_names() {
        println!("  {} = {}", name, Value::from_buffer(item.buffer(name)?)?);
    }
    Ok(())
}
