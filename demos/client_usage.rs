use std::time::Duration;

use evalhub_sdk::{
    BenchmarkFilter, BlockingEvalHubClient, ClientOptions, EvalHubClient, EvaluationRequest,
    ModelConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_url = std::env::var("EVALHUB_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let mut options = ClientOptions::new(base_url).with_timeout(Duration::from_secs(60));
    if let Ok(token) = std::env::var("EVALHUB_TOKEN") {
        options = options.with_token(token);
    }

    let client = EvalHubClient::new(options.clone())?;
    println!("health: {}", client.health().await?.status);

    let providers = client.providers().list().await?;
    println!("{} providers", providers.total_count);
    for provider in providers.items.iter().take(3) {
        println!("  - {}: {}", provider.id, provider.label.as_deref().unwrap_or(""));
    }

    let benchmarks = client
        .benchmarks()
        .list(&BenchmarkFilter::category("math"))
        .await?;
    println!("{} math benchmarks", benchmarks.len());

    let mut request = EvaluationRequest::new(
        "gsm8k",
        ModelConfig::new("meta-llama/Llama-2-7b-chat-hf")
            .with_url("http://vllm-service.my-namespace.svc.cluster.local:8000/v1"),
    );
    request.experiment_name = Some("GSM8K Evaluation".to_owned());
    request.tags.insert("environment".to_owned(), "dev".to_owned());

    let job = client.jobs().submit(&request).await?;
    println!("submitted {} ({})", job.id, job.status);

    let finished = client
        .jobs()
        .wait_for_completion(&job.id, Duration::from_secs(5), Duration::from_secs(300))
        .await?;
    println!("job {} finished: {}", finished.id, finished.status);
    if finished.status == evalhub_sdk::JobStatus::Completed {
        let results = client.jobs().results(&job.id).await?;
        for metric in &results.results {
            println!("  {} = {:?}", metric.metric_name, metric.metric_value);
        }
    }
    client.close();

    // The blocking client must not be created or dropped on a runtime thread.
    let job_id = job.id.clone();
    std::thread::spawn(move || -> anyhow::Result<()> {
        let blocking = BlockingEvalHubClient::new(options)?;
        let job = blocking.jobs().get(&job_id)?;
        println!("blocking client sees {} as {}", job.id, job.status);
        Ok(())
    })
    .join()
    .map_err(|_| anyhow::anyhow!("blocking demo thread panicked"))??;

    Ok(())
}
