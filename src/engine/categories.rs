//! Reconciles Device categories and Host lists before any task is synced.

use log::{info, warn};

use crate::adapter::{DeviceAdapter, HostAdapter, NamedList};
use crate::error::SyncResult;
use crate::sync_state::{CategoryMapping, SyncStateStore};

pub async fn reconcile(
    device: &dyn DeviceAdapter,
    host: &dyn HostAdapter,
    store: &SyncStateStore,
) -> SyncResult<()> {
    let device_categories = device.list_categories().await?;
    let host_lists = host.list_lists().await?;
    let mappings = store.all_category_mappings()?;

    let mut mapped_device_ids = std::collections::HashSet::new();
    let mut mapped_host_ids = std::collections::HashSet::new();

    for mapping in &mappings {
        let device_cat = device_categories.iter().find(|c| c.id == mapping.device_id);
        let host_list = host_lists.iter().find(|l| l.id == mapping.host_id);

        let (device_cat, host_list) = match (device_cat, host_list) {
            (Some(d), Some(h)) => (d, h),
            _ => continue, // one side gone; task-level pairing will clean up the tasks
        };
        mapped_device_ids.insert(device_cat.id.clone());
        mapped_host_ids.insert(host_list.id.clone());

        let device_renamed = device_cat.name != mapping.name;
        let host_renamed = host_list.name != mapping.name;

        let new_name = match (device_renamed, host_renamed) {
            (false, false) => continue,
            (true, false) => {
                info!(
                    "category rename: device {:?} -> {:?}, mirroring to host",
                    mapping.name, device_cat.name
                );
                host.rename_list(&host_list.name, &device_cat.name).await?;
                device_cat.name.clone()
            }
            (false, true) => {
                info!(
                    "category rename: host {:?} -> {:?}, mirroring to device",
                    mapping.name, host_list.name
                );
                device
                    .rename_category(&device_cat.id, &host_list.name)
                    .await?;
                host_list.name.clone()
            }
            (true, true) => {
                warn!(
                    "category renamed on both sides ({:?} -> device {:?} / host {:?}); device wins",
                    mapping.name, device_cat.name, host_list.name
                );
                host.rename_list(&host_list.name, &device_cat.name).await?;
                device_cat.name.clone()
            }
        };

        store.upsert_category_mapping(&CategoryMapping {
            device_id: mapping.device_id.clone(),
            host_id: mapping.host_id.clone(),
            name: new_name,
        })?;
    }

    reconcile_unmapped_device_categories(device, host, store, &device_categories, &host_lists, &mapped_device_ids)
        .await?;
    reconcile_unmapped_host_lists(device, host, store, &device_categories, &host_lists, &mapped_host_ids).await?;

    Ok(())
}

async fn reconcile_unmapped_device_categories(
    _device: &dyn DeviceAdapter,
    host: &dyn HostAdapter,
    store: &SyncStateStore,
    device_categories: &[NamedList],
    host_lists: &[NamedList],
    mapped_device_ids: &std::collections::HashSet<String>,
) -> SyncResult<()> {
    for cat in device_categories {
        if mapped_device_ids.contains(&cat.id) {
            continue;
        }
        let matched = host_lists
            .iter()
            .find(|l| l.name.to_lowercase() == cat.name.to_lowercase());

        let host_list = match matched {
            Some(found) => found.clone(),
            None => {
                let id = host.create_list(&cat.name).await?;
                NamedList {
                    id,
                    name: cat.name.clone(),
                }
            }
        };

        store.upsert_category_mapping(&CategoryMapping {
            device_id: cat.id.clone(),
            host_id: host_list.id,
            name: cat.name.clone(),
        })?;
    }
    Ok(())
}

async fn reconcile_unmapped_host_lists(
    device: &dyn DeviceAdapter,
    _host: &dyn HostAdapter,
    store: &SyncStateStore,
    device_categories: &[NamedList],
    host_lists: &[NamedList],
    mapped_host_ids: &std::collections::HashSet<String>,
) -> SyncResult<()> {
    for list in host_lists {
        if mapped_host_ids.contains(&list.id) {
            continue;
        }
        // Skip lists just created for a device category above; they'd otherwise get a
        // second, redundant mapping keyed the other way.
        if store.get_category_mapping_by_host_id(&list.id)?.is_some() {
            continue;
        }

        let matched = device_categories
            .iter()
            .find(|c| c.name.to_lowercase() == list.name.to_lowercase());

        let device_cat = match matched {
            Some(found) => found.clone(),
            None => {
                let id = device.create_category(&list.name).await?;
                NamedList {
                    id,
                    name: list.name.clone(),
                }
            }
        };

        store.upsert_category_mapping(&CategoryMapping {
            device_id: device_cat.id,
            host_id: list.id.clone(),
            name: list.name.clone(),
        })?;
    }
    Ok(())
}
