//! # Seed Data Generator
//!
//! Prepares a database for development: permissions, the `admin` and
//! `customer` roles, an admin account, a small catalog and one offer.
//!
//! ## Usage
//! ```bash
//! cargo run -p libreria-db --bin seed
//!
//! # Specify database path and admin credentials
//! cargo run -p libreria-db --bin seed -- --db ./libreria.db \
//!     --admin-email admin@libreria.local --admin-password changeme
//! ```
//!
//! Safe to run repeatedly: existing permissions, roles and users are kept,
//! and the catalog is only generated into an empty product table.

use chrono::{Duration, Utc};
use std::env;

use libreria_core::permissions::{all_permission_names, ADMIN_ROLE, CUSTOMER_ROLE};
use libreria_core::CatalogKind;
use libreria_db::{Database, DbConfig, NewOffer, NewProduct, NewUser};

/// (title, author, genre, publisher, price in cents, stock)
const BOOKS: &[(&str, &str, &str, &str, i64, i64)] = &[
    ("Cien años de soledad", "Gabriel García Márquez", "Novel", "Sudamericana", 2490, 25),
    ("Rayuela", "Julio Cortázar", "Novel", "Sudamericana", 2190, 12),
    ("Ficciones", "Jorge Luis Borges", "Short stories", "Emecé", 1890, 30),
    ("El Aleph", "Jorge Luis Borges", "Short stories", "Emecé", 1790, 18),
    ("Dune", "Frank Herbert", "Science fiction", "Chilton Books", 2990, 40),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "Science fiction", "Ace Books", 2390, 8),
    ("The Hobbit", "J. R. R. Tolkien", "Fantasy", "Allen & Unwin", 1990, 50),
    ("Cosmos", "Carl Sagan", "Popular science", "Random House", 2790, 15),
];

/// (name, price in cents, stock)
const ACCESSORIES: &[(&str, i64, i64)] = &[
    ("Leather bookmark", 590, 100),
    ("Reading light", 1990, 20),
    ("Canvas tote bag", 1290, 35),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./libreria.db");
    let mut admin_email = String::from("admin@libreria.local");
    let mut admin_password = String::from("admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-email" => {
                if i + 1 < args.len() {
                    admin_email = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-password" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Libreria Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>             Database file path (default: ./libreria.db)");
                println!("      --admin-email <EMAIL>   Admin login (default: admin@libreria.local)");
                println!("      --admin-password <PW>   Admin password (default: admin)");
                println!("  -h, --help                  Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Libreria Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // -------------------------------------------------------------------------
    // Access control
    // -------------------------------------------------------------------------

    let created = db.permissions().bulk_insert(&all_permission_names()).await?;
    println!("✓ Permissions: {} created", created.len());

    let all_permissions = db.permissions().list().await?;
    let all_ids: Vec<String> = all_permissions.iter().map(|p| p.id.clone()).collect();

    let admin = db.roles().get_or_create(ADMIN_ROLE, "Full access").await?;
    db.roles().set_permissions(&admin.id, &all_ids).await?;
    println!("✓ Role '{}' granted {} permissions", ADMIN_ROLE, all_ids.len());

    let customer = db
        .roles()
        .get_or_create(CUSTOMER_ROLE, "Registered shopper")
        .await?;
    println!("✓ Role '{}' ready", customer.name);

    if db.users().get_by_email(&admin_email).await?.is_none() {
        db.users()
            .insert(&NewUser {
                email: admin_email.clone(),
                full_name: "Administrator".to_string(),
                password: admin_password,
                phone: None,
                address: None,
                role_id: Some(admin.id.clone()),
            })
            .await?;
        println!("✓ Admin account {} created", admin_email);
    } else {
        println!("⚠ Admin account {} already exists", admin_email);
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    let existing = db.products().count().await?;
    if existing > 0 {
        println!();
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping catalog to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let books = ensure_entry(&db, CatalogKind::Category, "Books").await?;
    let accessories = ensure_entry(&db, CatalogKind::Category, "Accessories").await?;

    let now = Utc::now();
    let offer = db
        .offers()
        .insert(&NewOffer {
            name: "Launch week".to_string(),
            description: "Opening discount on selected titles".to_string(),
            discount_cents: 300,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(7),
        })
        .await?;
    println!("✓ Offer '{}' runs until {}", offer.name, offer.ends_at.date_naive());

    let mut generated = 0;
    for (index, (title, author, genre, publisher, price_cents, stock)) in BOOKS.iter().enumerate() {
        let author = ensure_entry(&db, CatalogKind::Author, author).await?;
        let genre = ensure_entry(&db, CatalogKind::Genre, genre).await?;
        let publisher = ensure_entry(&db, CatalogKind::Publisher, publisher).await?;

        let product = NewProduct {
            name: title.to_string(),
            description: format!("{} by {}", title, author.name),
            stock: *stock,
            price_cents: *price_cents,
            category_id: Some(books.id.clone()),
            genre_id: Some(genre.id),
            author_id: Some(author.id),
            publisher_id: Some(publisher.id),
            // Every third title is on offer
            offer_id: (index % 3 == 0).then(|| offer.id.clone()),
            ..Default::default()
        };

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", title, e);
            continue;
        }
        generated += 1;
    }

    for (name, price_cents, stock) in ACCESSORIES {
        let product = NewProduct {
            name: name.to_string(),
            stock: *stock,
            price_cents: *price_cents,
            category_id: Some(accessories.id.clone()),
            ..Default::default()
        };

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", name, e);
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {} products", generated);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Returns the catalog entry called `name`, creating it if needed.
async fn ensure_entry(
    db: &Database,
    kind: CatalogKind,
    name: &str,
) -> Result<libreria_core::CatalogEntry, libreria_db::DbError> {
    let repo = db.catalog(kind);
    match repo.get_by_name(name).await? {
        Some(entry) => Ok(entry),
        None => repo.create(name).await,
    }
}
