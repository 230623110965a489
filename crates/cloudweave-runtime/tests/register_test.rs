mod common;

use cloudweave_cloud::{
    DiskInfo, FileSystemInfo, Iid, KeyPairInfo, KeyPairReqInfo, ResourceKind, SecurityInfo,
    SubnetInfo, VmInfo, VpcInfo,
};
use cloudweave_runtime::{CspResourceInfo, RuntimeError};
use common::{CONN, TestCloud, vpc_req};

fn legacy_vm(system_id: &str) -> VmInfo {
    VmInfo {
        iid: Iid::system(system_id),
        vm_spec_name: "m5.large".to_string(),
        public_ip: "192.0.2.10".to_string(),
        ..Default::default()
    }
}

async fn create_key(env: &TestCloud, name: &str) -> KeyPairInfo {
    env.runtime
        .create_key(
            CONN,
            KeyPairReqInfo {
                iid: Iid::named(name),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_existing_vm() {
    let env = TestCloud::new();
    env.cloud.insert_vm(legacy_vm("i-1234"));

    let iid = env
        .runtime
        .register_resource(CONN, ResourceKind::Vm, None, "imported-vm", "i-1234")
        .await
        .unwrap();
    assert_eq!(iid, Iid::new("imported-vm", "i-1234"));

    let vm = env.runtime.get_vm(CONN, "imported-vm").await.unwrap();
    assert_eq!(vm.iid, Iid::new("imported-vm", "i-1234"));
    assert_eq!(vm.vm_spec_name, "m5.large");
    assert_eq!(
        env.runtime
            .get_csp_resource_name(CONN, ResourceKind::Vm, "imported-vm")
            .await
            .unwrap(),
        "i-1234"
    );
}

#[tokio::test]
async fn test_register_rejects_missing_and_tracked_resources() {
    let env = TestCloud::new();
    let rt = &env.runtime;

    let err = rt
        .register_resource(CONN, ResourceKind::Vm, None, "ghost", "i-0000")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(rt.list_resource_name(CONN, ResourceKind::Vm).await.unwrap().is_empty());

    env.cloud.insert_vm(legacy_vm("i-1234"));
    rt.register_resource(CONN, ResourceKind::Vm, None, "first", "i-1234")
        .await
        .unwrap();
    let err = rt
        .register_resource(CONN, ResourceKind::Vm, None, "second", "i-1234")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyExists(_)));
    let err = rt
        .register_resource(CONN, ResourceKind::Vm, None, "first", "i-5678")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_register_vpc_imports_subnets() {
    let env = TestCloud::new();
    env.cloud.insert_vpc(VpcInfo {
        iid: Iid::system("vpc-legacy"),
        ipv4_cidr: "172.16.0.0/16".to_string(),
        subnets: vec![
            SubnetInfo::new(Iid::system("subnet-a"), "172.16.1.0/24"),
            SubnetInfo::new(Iid::system("subnet-b"), "172.16.2.0/24"),
        ],
        ..Default::default()
    });

    env.runtime
        .register_resource(CONN, ResourceKind::Vpc, None, "legacy", "vpc-legacy")
        .await
        .unwrap();

    let vpc = env.runtime.get_vpc(CONN, "legacy").await.unwrap();
    let subnets: Vec<_> = vpc.subnets.iter().map(|s| s.iid.clone()).collect();
    assert_eq!(
        subnets,
        vec![
            Iid::new("legacy-subnet-0", "subnet-a"),
            Iid::new("legacy-subnet-1", "subnet-b"),
        ]
    );

    // Unregistering the VPC forgets its subnets too
    assert!(
        env.runtime
            .unregister_resource(CONN, ResourceKind::Vpc, "legacy")
            .await
            .unwrap()
    );
    assert!(
        env.runtime
            .list_resource_name(CONN, ResourceKind::Subnet)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(env.cloud.contains(ResourceKind::Vpc, "vpc-legacy"));
}

#[tokio::test]
async fn test_register_security_group_needs_vpc() {
    let env = TestCloud::new();
    let vpc = env
        .runtime
        .create_vpc(CONN, vpc_req("vpc-1", &[]))
        .await
        .unwrap();
    env.cloud.insert_security(SecurityInfo {
        iid: Iid::system("sg-legacy"),
        vpc_iid: Iid::system(&vpc.iid.system_id),
        ..Default::default()
    });

    let err = env
        .runtime
        .register_resource(CONN, ResourceKind::SecurityGroup, None, "legacy-sg", "sg-legacy")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidInput(_)));

    env.runtime
        .register_resource(
            CONN,
            ResourceKind::SecurityGroup,
            Some("vpc-1"),
            "legacy-sg",
            "sg-legacy",
        )
        .await
        .unwrap();
    let sg = env.runtime.get_security(CONN, "legacy-sg").await.unwrap();
    assert_eq!(sg.iid, Iid::new("legacy-sg", "sg-legacy"));
    assert_eq!(sg.vpc_iid.name_id, "vpc-1");
}

#[tokio::test]
async fn test_register_disk_and_file_system() {
    let env = TestCloud::new();
    let rt = &env.runtime;
    let vpc = rt
        .create_vpc(CONN, vpc_req("vpc-1", &[("web", "10.0.1.0/24")]))
        .await
        .unwrap();
    env.cloud.insert_disk(DiskInfo {
        iid: Iid::system("vol-1"),
        disk_type: "gp2".to_string(),
        disk_size: 40,
        ..Default::default()
    });
    env.cloud.insert_file_system(FileSystemInfo {
        iid: Iid::system("fs-1"),
        vpc_iid: Iid::system(&vpc.iid.system_id),
        access_subnets: vec![Iid::system(&vpc.subnets[0].iid.system_id)],
        capacity_gb: 500,
        ..Default::default()
    });

    rt.register_resource(CONN, ResourceKind::Disk, None, "old-data", "vol-1")
        .await
        .unwrap();
    let disk = rt.get_disk(CONN, "old-data").await.unwrap();
    assert_eq!(disk.iid, Iid::new("old-data", "vol-1"));
    assert_eq!(disk.disk_size, 40);
    assert!(disk.owner_vm.is_none());

    rt.register_resource(CONN, ResourceKind::FileSystem, None, "old-share", "fs-1")
        .await
        .unwrap();
    let fs = rt.get_file_system(CONN, "old-share").await.unwrap();
    assert_eq!(fs.iid, Iid::new("old-share", "fs-1"));
    assert_eq!(fs.vpc_iid.name_id, "vpc-1");
    assert_eq!(fs.access_subnets[0].name_id, "web");
    assert_eq!(fs.capacity_gb, 500);
}

#[tokio::test]
async fn test_list_all_resource_three_way() {
    let env = TestCloud::new();
    let kept = create_key(&env, "kept").await;
    let lost = create_key(&env, "lost").await;

    // Two tracked, one of them gone from the provider
    env.cloud.remove(ResourceKind::KeyPair, &lost.iid.system_id);
    let all = env
        .runtime
        .list_all_resource(CONN, ResourceKind::KeyPair)
        .await
        .unwrap();
    assert_eq!(all.mapped, vec![kept.iid.clone()]);
    assert_eq!(all.only_tracked, vec![lost.iid.clone()]);
    assert!(all.only_provider.is_empty());

    // A key nobody registered shows up as provider-only
    env.cloud.insert_key(KeyPairInfo {
        iid: Iid::system("key-outside"),
        ..Default::default()
    });
    let all = env
        .runtime
        .list_all_resource(CONN, ResourceKind::KeyPair)
        .await
        .unwrap();
    assert_eq!(all.only_provider, vec![Iid::system("key-outside")]);

    // ListKey skips the vanished key
    let listed = env.runtime.list_key(CONN).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].iid.name_id, "kept");
}

#[tokio::test]
async fn test_unregister_then_delete_csp_resource() {
    let env = TestCloud::new();
    let key = create_key(&env, "deploy").await;
    let rt = &env.runtime;

    let err = rt
        .delete_csp_resource(CONN, ResourceKind::KeyPair, &key.iid.system_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidInput(_)));

    assert!(
        rt.unregister_resource(CONN, ResourceKind::KeyPair, "deploy")
            .await
            .unwrap()
    );
    assert!(env.cloud.contains(ResourceKind::KeyPair, &key.iid.system_id));

    assert!(
        rt.delete_csp_resource(CONN, ResourceKind::KeyPair, &key.iid.system_id)
            .await
            .unwrap()
    );
    assert!(!env.cloud.contains(ResourceKind::KeyPair, &key.iid.system_id));
}

#[tokio::test(start_paused = true)]
async fn test_delete_csp_vm_waits_for_termination() {
    let env = TestCloud::new();
    env.cloud.insert_vm(legacy_vm("i-orphan"));

    assert!(
        env.runtime
            .delete_csp_resource(CONN, ResourceKind::Vm, "i-orphan")
            .await
            .unwrap()
    );
    assert!(!env.cloud.contains(ResourceKind::Vm, "i-orphan"));

    let err = env
        .runtime
        .delete_csp_resource(CONN, ResourceKind::Subnet, "subnet-x")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_counts_follow_tracked_records() {
    let env = TestCloud::new();
    let rt = &env.runtime;
    rt.create_vpc(CONN, vpc_req("vpc-1", &[("web", "10.0.1.0/24"), ("db", "10.0.2.0/24")]))
        .await
        .unwrap();
    create_key(&env, "deploy").await;
    create_key(&env, "backup").await;

    assert_eq!(rt.count_resources(CONN, ResourceKind::Vpc).await.unwrap(), 1);
    assert_eq!(rt.count_resources(CONN, ResourceKind::Subnet).await.unwrap(), 2);
    assert_eq!(rt.count_resources(CONN, ResourceKind::KeyPair).await.unwrap(), 2);
    assert_eq!(rt.count_resources(CONN, ResourceKind::Vm).await.unwrap(), 0);
    assert_eq!(rt.count_resources("other", ResourceKind::KeyPair).await.unwrap(), 0);
    assert_eq!(rt.count_all_resources(ResourceKind::KeyPair).await.unwrap(), 2);
    assert!(matches!(
        rt.count_resources(" ", ResourceKind::Vpc).await,
        Err(RuntimeError::InvalidInput(_))
    ));

    // Provider-only resources are not counted
    env.cloud.insert_key(KeyPairInfo {
        iid: Iid::system("key-outside"),
        ..Default::default()
    });
    assert_eq!(rt.count_all_resources(ResourceKind::KeyPair).await.unwrap(), 2);
    rt.unregister_resource(CONN, ResourceKind::KeyPair, "backup")
        .await
        .unwrap();
    assert_eq!(rt.count_resources(CONN, ResourceKind::KeyPair).await.unwrap(), 1);
}

#[tokio::test]
async fn test_read_untracked_provider_resources() {
    let env = TestCloud::new();
    let rt = &env.runtime;
    env.cloud.insert_vm(legacy_vm("i-orphan"));
    env.cloud.insert_key(KeyPairInfo {
        iid: Iid::system("key-outside"),
        ..Default::default()
    });

    let info = rt
        .get_csp_resource_info(CONN, ResourceKind::KeyPair, "key-outside")
        .await
        .unwrap();
    assert_eq!(info.kind(), ResourceKind::KeyPair);
    assert_eq!(info.iid().system_id, "key-outside");

    match rt
        .get_csp_resource_info(CONN, ResourceKind::Vm, "i-orphan")
        .await
        .unwrap()
    {
        CspResourceInfo::Vm(vm) => assert_eq!(vm.vm_spec_name, "m5.large"),
        other => panic!("expected a VM, got {:?}", other.kind()),
    }

    let vm = rt.get_csp_vm(CONN, "i-orphan").await.unwrap();
    assert_eq!(vm.iid.system_id, "i-orphan");
    assert!(vm.iid.name_id.is_empty());
    assert_eq!(vm.public_ip, "192.0.2.10");

    assert!(
        rt.get_csp_vm(CONN, "i-missing")
            .await
            .unwrap_err()
            .is_not_found()
    );
    let err = rt
        .get_csp_resource_info(CONN, ResourceKind::Subnet, "subnet-x")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidInput(_)));
    // Nothing was registered along the way
    assert!(rt.list_resource_name(CONN, ResourceKind::Vm).await.unwrap().is_empty());
}
