use crate::utils::{self, Context};
use colored::Colorize;

pub async fn handle(ctx: &Context, instance: &str, status: &str) -> anyhow::Result<()> {
    if !ctx.json {
        println!(
            "{}",
            format!("Waiting for '{}' to become {} ...", instance, status).green()
        );
    }

    let action = format!("wait-{}", status);
    let result = ctx
        .service(&action)
        .wait_for_instance(&ctx.client, instance, status)
        .await;
    utils::report(result, ctx.json)
}
