//! Center expiry against the paused tokio clock

use beacon_core::crypto::{authorization_header, Keypair};
use beacon_core::session::memory_transport;
use beacon_core::{
    DistributionService, Error, Identity, IdentityRecord, KeyDirectory, MemoryDirectory, SessionConfig,
    SessionEnd,
};
use std::sync::Arc;
use std::time::Duration;

const ALICE: &str = "alice@example.com";
const TIMEOUT: Duration = Duration::from_secs(30);

fn service() -> anyhow::Result<(Arc<DistributionService>, Keypair)> {
    let directory = Arc::new(MemoryDirectory::new());
    let (record, keypair) = IdentityRecord::mint(Identity::new(ALICE)?);
    directory.add(record)?;
    let service = DistributionService::new(directory, Some(TIMEOUT), SessionConfig::default());
    Ok((Arc::new(service), keypair))
}

async fn publish(service: &DistributionService, key: &Keypair, name: &str) -> anyhow::Result<String> {
    let header = authorization_header(&key.sign_request(name.as_bytes()));
    Ok(service
        .publish(ALICE, Some(header.as_str()), name.as_bytes())
        .await?
        .to_string())
}

#[tokio::test(start_paused = true)]
async fn test_center_gone_after_timeout() -> anyhow::Result<()> {
    let (service, key) = service()?;
    let center = publish(&service, &key, "inbox").await?;

    tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
    assert_eq!(service.poll(&center).await?, "");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(matches!(service.poll(&center).await, Err(Error::CenterNotFound(_))));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_expiry_disconnects_subscribers() -> anyhow::Result<()> {
    let (service, key) = service()?;
    let center = publish(&service, &key, "inbox").await?;

    let (outbound, inbound, mut peer) = memory_transport(4);
    let session = {
        let service = service.clone();
        let center = center.clone();
        tokio::spawn(async move { service.attach(&center, outbound, inbound).await })
    };

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;

    assert_eq!(session.await??, SessionEnd::Stopped);
    assert_eq!(peer.recv().await, None);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_manual_removal_before_expiry() -> anyhow::Result<()> {
    let (service, key) = service()?;
    publish(&service, &key, "inbox").await?;

    let header = authorization_header(&key.sign_request(b"inbox"));
    service.unpublish(ALICE, Some(header.as_str()), b"inbox").await?;

    // The leftover timer must not disturb a center created afterwards.
    tokio::time::sleep(TIMEOUT / 2).await;
    let center = publish(&service, &key, "inbox").await?;
    tokio::time::sleep(TIMEOUT / 2 + Duration::from_secs(1)).await;
    assert_eq!(service.poll(&center).await?, "");

    Ok(())
}
