use sqlx_mysql_shim::{
    with_nested_transaction, with_transaction, ClientConnectionTransactionState, MySqlClient,
    Parameters, TransactionManager,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "mysql://localhost/test".to_string());
    let mut manager = TransactionManager::new(MySqlClient::connect(&database_url)?);

    println!("=== Nested Transaction (Savepoint) Example ===\n");

    // Example 1: Successful nested transaction
    println!("1. Nested transaction - both succeed...");
    with_transaction(&mut manager, |tx| {
        let result = tx.client_mut().execute_named(
            "INSERT INTO users (name, email) VALUES (:name, :email)",
            &Parameters::new()
                .bind(":name", "David")
                .bind(":email", "david@example.com"),
        )?;
        let user_id = result.last_insert_id();
        println!("   Outer: Created user with ID {}", user_id);

        with_nested_transaction(tx, |nested_tx| {
            nested_tx.client_mut().execute_named(
                "INSERT INTO audit_log (user_id, action) VALUES (:user_id, :action)",
                &Parameters::new()
                    .bind(":user_id", user_id)
                    .bind(":action", "User created"),
            )?;
            println!("   Nested: Created audit log");
            Ok(())
        })?;

        println!("   ✓ Both transactions committed\n");
        Ok(())
    })?;

    // Example 2: Nested transaction fails, outer succeeds
    println!("2. Nested transaction fails, outer succeeds...");
    with_transaction(&mut manager, |tx| {
        let result = tx.client_mut().execute_named(
            "INSERT INTO users (name, email) VALUES (:name, :email)",
            &Parameters::new()
                .bind(":name", "Eve")
                .bind(":email", "eve@example.com"),
        )?;
        let user_id = result.last_insert_id();
        println!("   Outer: Created user with ID {}", user_id);

        let nested_result = with_nested_transaction(tx, |nested_tx| {
            // This will fail
            nested_tx.client_mut().execute_named(
                "INSERT INTO non_existent_table VALUES (:user_id)",
                &Parameters::new().bind(":user_id", user_id),
            )?;
            Ok(())
        });

        match nested_result {
            Ok(_) => println!("   ✗ Nested should have failed!"),
            Err(e) => println!("   Nested: Failed ({})", e),
        }

        println!("   Outer: Continuing despite nested failure...");
        println!("   ✓ Outer transaction committed (user created)\n");
        Ok(())
    })?;

    // Example 3: DDL inside a savepoint commits implicitly
    println!("3. DDL inside a nested transaction...");
    with_transaction(&mut manager, |tx| {
        tx.add_end_callback(|committed| {
            println!("   Callback: root transaction ended, committed = {}", committed);
        })?;

        with_nested_transaction(tx, |nested_tx| {
            // MySQL commits the open transaction and forgets every savepoint here
            nested_tx.client_mut().execute_named(
                "CREATE TABLE IF NOT EXISTS shim_demo (id INT PRIMARY KEY)",
                &Parameters::new(),
            )?;
            Ok(())
        })?;

        println!("   Stack collapsed to depth {}", tx.manager().depth());
        Ok(())
    })?;

    if manager.connection_state() == Some(ClientConnectionTransactionState::Voided) {
        println!("   ✓ Server had already committed, nothing left to do\n");
    } else {
        println!("   ✓ Transaction committed\n");
    }

    println!("=== All nested transaction examples completed ===");

    manager.into_client().close()?;
    Ok(())
}
