//! Drives an envelope through the parser into the store the way a worker
//! does, without sockets.

use arnu::{Action, ReferenceData, ReferenceResult};
use async_trait::async_trait;
use store::{MemoryKeyspace, ServiceStore, StoreTier, TierSelector};

struct StubReference;

#[async_trait]
impl ReferenceData for StubReference {
    async fn station_name(&self, station_code: &str) -> ReferenceResult<Option<String>> {
        Ok(Some(format!("Station {station_code}")))
    }

    async fn transport_mode(&self, _mode_code: &str) -> ReferenceResult<Option<String>> {
        Ok(Some("Intercity".to_owned()))
    }

    async fn company_name(&self, _company_code: &str) -> ReferenceResult<Option<String>> {
        Ok(None)
    }
}

const WINGS_ENVELOPE: &str = "\
<PutServiceInfoIn><ServiceInfoList><ServiceInfo>\
<ServiceCode>6815</ServiceCode>\
<TransportModeCode>IC</TransportModeCode>\
<StopList>\
<Stop><StopCode>ut</StopCode><StopServiceCode>1750</StopServiceCode>\
<Departure>2015-04-01T12:00:00+02:00</Departure></Stop>\
<Stop><StopCode>gd</StopCode><StopServiceCode>12850</StopServiceCode>\
<Arrival>2015-04-01T12:40:00+02:00</Arrival>\
<Departure>2015-04-01T12:41:00+02:00</Departure></Stop>\
<Stop><StopCode>rtd</StopCode><StopServiceCode>12850</StopServiceCode>\
<Arrival>2015-04-01T13:00:00+02:00</Arrival></Stop>\
</StopList>\
</ServiceInfo></ServiceInfoList></PutServiceInfoIn>";

async fn apply(
    store: &ServiceStore<MemoryKeyspace>,
    parsed: Vec<(model::Service, Action)>,
) {
    for (service, action) in parsed {
        match action {
            Action::Store => store.store(&service, StoreTier::Actual).await.unwrap(),
            Action::Remove => {
                store
                    .delete(
                        &service.servicedate_str(),
                        &service.servicenumber,
                        StoreTier::Actual,
                    )
                    .await
                    .map(|_| ())
                    .unwrap();
            }
        }
    }
}

#[tokio::test]
async fn wings_survive_the_full_pipeline() {
    let store = ServiceStore::new(MemoryKeyspace::new());

    let parsed = arnu::parse_message(WINGS_ENVELOPE, &StubReference)
        .await
        .unwrap();
    assert_eq!(parsed.len(), 2);
    apply(&store, parsed).await;

    // Both public numbers answer with the shared run.
    let first = store
        .get("2015-04-01", "1750", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].destination_str(), Some("rtd"));
    assert_eq!(first[0].stops.len(), 3);

    let second = store
        .get("2015-04-01", "12850", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second[0].service_id, "12850-ut-rtd");

    // Deleting one wing leaves the other.
    assert!(store
        .delete("2015-04-01", "1750", StoreTier::Actual)
        .await
        .unwrap());
    assert!(store
        .get("2015-04-01", "1750", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get("2015-04-01", "12850", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn removal_messages_clear_the_actual_tier() {
    let store = ServiceStore::new(MemoryKeyspace::new());

    let stored = arnu::parse_message(WINGS_ENVELOPE, &StubReference)
        .await
        .unwrap();
    apply(&store, stored).await;

    let removal = WINGS_ENVELOPE
        .replace("<ServiceCode>", "<ServiceType>remove</ServiceType><ServiceCode>")
        .replace("<Stop>", "<Stop StopType=\"Cancelled-Stop\">");
    let parsed = arnu::parse_message(&removal, &StubReference).await.unwrap();
    assert!(parsed.iter().all(|(_, action)| *action == Action::Remove));
    apply(&store, parsed).await;

    assert!(store
        .get("2015-04-01", "1750", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get("2015-04-01", "12850", TierSelector::ActualOrScheduled)
        .await
        .unwrap()
        .is_none());
}
