//! # Seed Data Generator
//!
//! Populates the database with a demo hardware-store catalog and a few
//! credit clients for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./mostrador_dev.db
//! cargo run -p mostrador-db --bin seed
//!
//! # Specify database path
//! cargo run -p mostrador-db --bin seed -- --db ./data/mostrador.db
//!
//! # Also generate filler products for lookup benchmarks
//! cargo run -p mostrador-db --bin seed -- --filler 2000
//! ```
//!
//! ## Generated Catalog
//! Every pricing shape the cart supports is represented:
//! - Wholesale groups (screws of several sizes share one tier)
//! - Legacy packs (box of 100 nails with its own barcode)
//! - Presentations (paint by liter and by 4-liter gallon)
//! - Loose units (single screws out of a 50-piece box)
//! - Weighable products (wire by the kilo)

use std::env;

use mostrador_core::types::Presentation;
use mostrador_core::{Client, Money, Product, Quantity};
use mostrador_db::{Database, DbConfig};

/// Wholesale group: (group id, sizes, unit price cents, tier min, tier price cents)
const SCREW_GROUP: (&str, &[&str], i64, i64, i64) = (
    "tornillo-madera",
    &["1/2\"", "3/4\"", "1\"", "1 1/2\"", "2\""],
    150,
    50,
    110,
);

const FILLER_CATEGORIES: &[(&str, &str)] = &[
    ("ELE", "Contacto"),
    ("PLO", "Codo PVC"),
    ("HER", "Llave"),
    ("PIN", "Brocha"),
    ("JAR", "Manguera"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut filler: usize = 0;
    let mut db_path = String::from("./mostrador_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--filler" | "-f" => {
                if i + 1 < args.len() {
                    filler = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mostrador POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./mostrador_dev.db)");
                println!("  -f, --filler <N>     Extra generated products (default: 0)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Mostrador POS Seed Data Generator");
    println!("====================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut catalog = demo_catalog();
    catalog.extend((0..filler).map(filler_product));

    let start = std::time::Instant::now();
    let mut generated = 0;
    for product in &catalog {
        if let Err(e) = db.products().insert(product).await {
            eprintln!("Failed to insert {}: {}", product.id, e);
            continue;
        }
        generated += 1;
    }
    println!("✓ Inserted {} products in {:?}", generated, start.elapsed());

    for client in demo_clients() {
        db.clients().insert(&client).await?;
        println!("  Client {} (limit {})", client.name, client.credit_limit);
    }

    println!();
    println!("Verifying code lookup...");
    for code in ["CLV-100", "PINT-GAL", "TOR-1"] {
        match db.products().resolve_code(code).await? {
            Some((product, variant)) => {
                println!("  {} → {} ({:?})", code, product.name, variant);
            }
            None => println!("  {} → not found", code),
        }
    }

    println!();
    println!("✓ Seed complete!");
    Ok(())
}

fn demo_catalog() -> Vec<Product> {
    let mut catalog = Vec::new();

    let (group, sizes, price, min, tier) = SCREW_GROUP;
    for (idx, size) in sizes.iter().enumerate() {
        let mut screw = Product::basic(
            format!("tor-{}", idx + 1),
            format!("Tornillo madera {}", size),
            Money::from_cents(price),
        );
        screw.sku = Some(format!("TOR-{}", idx + 1));
        screw.group_id = Some(group.to_string());
        screw.wholesale_price = Some(Money::from_cents(tier));
        screw.wholesale_min = Some(Quantity::from_units(min));
        screw.stock = Quantity::from_units(500);
        screw.min_stock = Quantity::from_units(100);
        catalog.push(screw);
    }

    let mut nails = Product::basic("clavo-2", "Clavo 2\"", Money::from_cents(80));
    nails.sku = Some("CLV-2".to_string());
    nails.pack_price = Some(Money::from_major(65));
    nails.pack_quantity = Some(100);
    nails.pack_barcode = Some("CLV-100".to_string());
    nails.stock = Quantity::from_units(2000);
    catalog.push(nails);

    let mut paint = Product::basic("pint-blanca", "Pintura vinílica blanca 1L", Money::from_major(95));
    paint.sku = Some("PINT-1L".to_string());
    paint.presentations.push(Presentation {
        id: "galon".to_string(),
        name: "Galón 4L".to_string(),
        quantity: 4,
        price: Money::from_major(340),
        barcode: Some("PINT-GAL".to_string()),
    });
    paint.stock = Quantity::from_units(40);
    paint.min_stock = Quantity::from_units(8);
    catalog.push(paint);

    let mut drywall = Product::basic("pija-tabla", "Caja pijas tablaroca 50pz", Money::from_major(60));
    drywall.sku = Some("PIJ-50".to_string());
    drywall.content_per_unit = Some(50);
    drywall.content_unit_price = Some(Money::from_cents(150));
    drywall.stock = Quantity::from_units(12);
    catalog.push(drywall);

    let mut wire = Product::basic("alambre-rec", "Alambre recocido", Money::from_major(42));
    wire.sku = Some("ALM-KG".to_string());
    wire.short_code = Some("7".to_string());
    wire.is_weighable = true;
    wire.stock = Quantity::from_decimal(85.5);
    catalog.push(wire);

    let mut cement = Product::basic("cemento-50", "Cemento gris 50kg", Money::from_major(245));
    cement.sku = Some("CEM-50".to_string());
    cement.barcodes = vec!["7501000000509".to_string()];
    cement.stock = Quantity::from_units(30);
    cement.min_stock = Quantity::from_units(10);
    catalog.push(cement);

    catalog
}

fn filler_product(seed: usize) -> Product {
    let (code, name) = FILLER_CATEGORIES[seed % FILLER_CATEGORIES.len()];
    let price = 1_500 + ((seed * 37) % 20_000) as i64;
    let mut product = Product::basic(
        format!("{}-{:05}", code.to_lowercase(), seed),
        format!("{} modelo {}", name, seed),
        Money::from_cents(price),
    );
    product.sku = Some(format!("{}-{:05}", code, seed));
    product.cost_price = Money::from_cents(price * (60 + (seed % 20) as i64) / 100);
    product.stock = Quantity::from_units((seed % 101) as i64);
    product
}

fn demo_clients() -> Vec<Client> {
    [
        ("cli-constructora", "Constructora Álamo", 50_000),
        ("cli-plomero", "Plomería Hernández", 8_000),
        ("cli-vecino", "Don Ramiro", 1_500),
    ]
    .into_iter()
    .map(|(id, name, limit)| Client {
        id: id.to_string(),
        name: name.to_string(),
        phone: None,
        credit_limit: Money::from_major(limit),
        current_balance: Money::zero(),
    })
    .collect()
}
