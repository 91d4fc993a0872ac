use sqlx::Row;
use sqlx_mysql_shim::{with_transaction, MySqlClient, Parameters, TransactionManager};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let mut manager = TransactionManager::new(MySqlClient::connect(&database_url)?);

    println!("=== Basic Transaction Example ===\n");

    // Example 1: Simple INSERT
    println!("1. Creating a user...");
    with_transaction(&mut manager, |tx| {
        tx.client_mut().execute_named(
            "INSERT INTO users (name, email) VALUES (:name, :email)",
            &Parameters::new()
                .bind(":name", "Alice")
                .bind(":email", "alice@example.com"),
        )?;
        Ok(())
    })?;
    println!("   ✓ User created successfully\n");

    // Example 2: Multiple operations in one transaction
    println!("2. Creating user with profile...");
    let user_id = with_transaction(&mut manager, |tx| {
        let result = tx.client_mut().execute_named(
            "INSERT INTO users (name, email) VALUES (:name, :email)",
            &Parameters::new()
                .bind(":name", "Bob")
                .bind(":email", "bob@example.com"),
        )?;
        let user_id = result.last_insert_id();

        // Positional and named placeholders can be mixed
        tx.client_mut().execute_named(
            "INSERT INTO profiles (user_id, bio) VALUES (?, :bio)",
            &Parameters::new()
                .bind_positional(user_id)
                .bind(":bio", "Software Developer"),
        )?;

        Ok(user_id)
    })?;
    println!("   ✓ User and profile created with ID: {}\n", user_id);

    // Example 3: Error handling and automatic rollback
    println!("3. Testing automatic rollback on error...");
    let result: sqlx_mysql_shim::Result<()> = with_transaction(&mut manager, |tx| {
        tx.client_mut().execute_named(
            "INSERT INTO users (name, email) VALUES (:name, :email)",
            &Parameters::new()
                .bind(":name", "Charlie")
                .bind(":email", "charlie@example.com"),
        )?;

        // This will cause an error
        tx.client_mut()
            .execute_named("SELECT * FROM non_existent_table", &Parameters::new())?;

        Ok(())
    });

    match result {
        Ok(_) => println!("   ✗ Should have failed!"),
        Err(e) => println!("   ✓ Transaction rolled back: {}\n", e),
    }

    // Example 4: Placeholders inside literals are left alone
    println!("4. Counting users...");
    let rows = manager.client_mut().fetch_all_named(
        "SELECT COUNT(*) AS total FROM users WHERE name <> ':name' AND id > :min_id",
        &Parameters::new().bind(":min_id", 0),
    )?;
    let total: i64 = rows.first().map(|row| row.try_get("total")).transpose()?.unwrap_or(0);
    println!("   Users: {}\n", total);

    println!("=== All examples completed successfully ===");

    manager.into_client().close()?;
    Ok(())
}
