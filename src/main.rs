use crate::core::system::System;

mod core;
mod interface;
mod model;
mod platform;
#[cfg(test)]
mod test_support;
mod utils;

#[tokio::main]
async fn main() {
    match System::initialize().await {
        Ok(system) => {
            system.run().await;
            system.terminate().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            std::process::exit(1);
        }
    }
}
