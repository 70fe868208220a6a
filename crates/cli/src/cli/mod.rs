pub mod call;
pub mod check;
pub mod endpoints;
pub mod generate;

pub async fn run_cli_async<F, Fut>(f: F) -> i32
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {err}", console::style("error:").red().bold());
            1
        }
    }
}
