use std::env;
use std::sync::Arc;

use pure_a9::{ApplianceConfig, ApplianceController, Credentials, SessionRegistry};

#[tokio::main]
async fn main() -> pure_a9::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let (Some(username), Some(password), Some(appliance)) = (args.get(1), args.get(2), args.get(3))
    else {
        eprintln!("usage: monitor <username> <password> <appliance-id> [fan-speed]");
        std::process::exit(2);
    };
    let fan_speed: Option<i32> = args.get(4).and_then(|s| s.parse().ok());

    let registry = Arc::new(SessionRegistry::default());
    let handle = ApplianceController::builder(
        ApplianceConfig::new(appliance.clone(), Credentials::new(username.clone(), password.clone())),
        registry,
    )
    .on_event(|event| {
        println!("{event:?}");
    })
    .on_state(|state| {
        let m = &state.measurements;
        println!(
            "power: {} | mode: {:?} | fan: {:?} | PM2.5: {:?} | CO2: {:?} | filter: {:?}%",
            state.power, state.mode, state.fan_speed, m.pm2_5, m.co2, m.filter_life,
        );
    })
    .build()
    .spawn();

    if let Some(speed) = fan_speed {
        println!("Setting fan speed to {speed}...");
        handle.set_fan_speed(speed).await?;
    }

    let mut status = handle.subscribe();
    println!("Monitoring {appliance}. Ctrl-C to stop.");
    while status.changed().await.is_ok() {
        let current = status.borrow().clone();
        println!("scheduler: {:?} | availability: {:?}", current.scheduler, current.availability);
    }
    Ok(())
}
