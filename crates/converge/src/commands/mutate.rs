use crate::utils::{self, Context};
use colored::Colorize;
use converge_cloud::Mutation;

pub async fn handle<M>(ctx: &Context, mutation: &M) -> anyhow::Result<()>
where
    M: Mutation + ?Sized,
{
    if !ctx.json {
        println!(
            "{}",
            format!("{} on '{}' ...", mutation.action(), mutation.instance_id()).green()
        );
        let config = ctx.converge_config(mutation.action());
        println!(
            "  timeout: {}s, poll interval: {}s",
            config.timeout.as_secs().to_string().cyan(),
            config.poll_interval.as_secs().to_string().cyan()
        );
    }

    let result = ctx
        .service(mutation.action())
        .mutate(&ctx.client, mutation)
        .await;
    utils::report(result, ctx.json)
}
