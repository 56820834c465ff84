//! Simple sequential workflow example.

use async_trait::async_trait;
use kumihimo::prelude::*;

#[derive(Debug)]
struct DataLoadTask;

#[async_trait]
impl Task for DataLoadTask {
    async fn run(&self, ctx: &mut Context) -> Result<(), TaskError> {
        println!("Loading data...");
        ctx.insert("data", "sample data");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let workflow = Workflow::builder()
        .name("simple")
        .add_step("load", DataLoadTask)
        .add_fn("shout", |ctx| {
            let data: String = ctx.require("data")?;
            ctx.insert("data", data.to_uppercase());
            Ok(())
        })
        .build()?;

    match workflow.execute(&Context::new()).await {
        Ok(result) => {
            println!("Workflow completed successfully");
            if let Some(data) = result.get::<String>("data") {
                println!("Data: {}", data);
            }
        }
        Err(error) => eprintln!("Workflow failed: {}", error),
    }

    Ok(())
}
