mod common;

use cloudweave_cloud::{
    FileSystemReqInfo, HealthCheckerInfo, Iid, KeyValue, ListenerInfo, NlbReqInfo, ResourceKind,
    SubnetInfo, VmControl, VmGroupInfo,
};
use cloudweave_runtime::RuntimeError;
use common::{CONN, TestCloud, vm_req};

fn nlb_req(name: &str, vms: &[&str]) -> NlbReqInfo {
    NlbReqInfo {
        iid: Iid::named(name),
        vpc_iid: Iid::named("vpc-1"),
        listener: ListenerInfo {
            protocol: "TCP".to_string(),
            port: "80".to_string(),
            ..Default::default()
        },
        vm_group: VmGroupInfo {
            protocol: "TCP".to_string(),
            port: "8080".to_string(),
            vms: vms.iter().map(|vm| Iid::named(*vm)).collect(),
        },
        health_checker: HealthCheckerInfo {
            protocol: "TCP".to_string(),
            port: "8080".to_string(),
            interval: 10,
            timeout: 5,
            threshold: 3,
        },
        tags: Vec::new(),
    }
}

fn names(iids: &[Iid]) -> Vec<&str> {
    let mut names: Vec<_> = iids.iter().map(|iid| iid.name_id.as_str()).collect();
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn test_nlb_lifecycle() {
    let env = TestCloud::new();
    env.network().await;
    let rt = &env.runtime;
    rt.start_vm(CONN, vm_req("vm-1")).await.unwrap();
    rt.start_vm(CONN, vm_req("vm-2")).await.unwrap();

    let nlb = rt.create_nlb(CONN, nlb_req("web-lb", &["vm-1"])).await.unwrap();
    assert_eq!(nlb.iid.name_id, "web-lb");
    assert_eq!(nlb.vpc_iid.name_id, "vpc-1");
    assert_eq!(names(&nlb.vm_group.vms), vec!["vm-1"]);
    assert!(!nlb.listener.dns_name.is_empty());

    let err = rt
        .create_nlb(CONN, nlb_req("web-lb", &["vm-2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyExists(_)));

    let grown = rt.add_vms(CONN, "web-lb", &[Iid::named("vm-2")]).await.unwrap();
    assert_eq!(names(&grown.vm_group.vms), vec!["vm-1", "vm-2"]);
    let err = rt.add_vms(CONN, "web-lb", &[]).await.unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidInput(_)));

    // A suspending member is reported unhealthy
    rt.control_vm(CONN, "vm-2", VmControl::Suspend).await.unwrap();
    let health = rt.get_vm_group_health(CONN, "web-lb").await.unwrap();
    assert_eq!(names(&health.all_vms), vec!["vm-1", "vm-2"]);
    assert_eq!(names(&health.healthy_vms), vec!["vm-1"]);
    assert_eq!(names(&health.unhealthy_vms), vec!["vm-2"]);

    assert!(
        rt.remove_vms(CONN, "web-lb", &[Iid::named("vm-2")])
            .await
            .unwrap()
    );
    let fetched = rt.get_nlb(CONN, "web-lb").await.unwrap();
    assert_eq!(names(&fetched.vm_group.vms), vec!["vm-1"]);
    assert_eq!(rt.list_nlb(CONN).await.unwrap().len(), 1);

    assert!(rt.delete_nlb(CONN, "web-lb", false).await.unwrap());
    assert!(rt.list_nlb(CONN).await.unwrap().is_empty());
    assert_eq!(env.cloud.count(ResourceKind::Nlb), 0);
}

#[tokio::test]
async fn test_file_system_access_subnets() {
    let env = TestCloud::new();
    env.network().await;
    let rt = &env.runtime;
    rt.add_subnet(
        CONN,
        "vpc-1",
        SubnetInfo::new(Iid::named("subnet-2"), "10.0.2.0/24"),
    )
    .await
    .unwrap();

    let fs = rt
        .create_file_system(
            CONN,
            FileSystemReqInfo {
                iid: Iid::named("shared"),
                vpc_iid: Iid::named("vpc-1"),
                access_subnets: vec![Iid::named("subnet-1")],
                capacity_gb: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fs.iid.name_id, "shared");
    assert_eq!(fs.vpc_iid.name_id, "vpc-1");
    assert_eq!(names(&fs.access_subnets), vec!["subnet-1"]);

    let opened = rt.add_access_subnet(CONN, "shared", "subnet-2").await.unwrap();
    assert_eq!(names(&opened.access_subnets), vec!["subnet-1", "subnet-2"]);
    let err = rt
        .add_access_subnet(CONN, "shared", "subnet-9")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NotFound(_)));

    assert!(
        rt.remove_access_subnet(CONN, "shared", "subnet-1")
            .await
            .unwrap()
    );
    let subnets = rt.list_access_subnet(CONN, "shared").await.unwrap();
    assert_eq!(names(&subnets), vec!["subnet-2"]);

    assert_eq!(rt.list_file_system(CONN).await.unwrap().len(), 1);
    assert!(rt.delete_file_system(CONN, "shared", false).await.unwrap());
    assert!(rt.list_file_system(CONN).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tags_follow_user_names() {
    let env = TestCloud::new();
    env.network().await;
    let rt = &env.runtime;

    let added = rt
        .add_tag(CONN, ResourceKind::Vpc, "vpc-1", KeyValue::new("env", "staging"))
        .await
        .unwrap();
    assert_eq!(added, KeyValue::new("env", "staging"));
    rt.add_tag(CONN, ResourceKind::Vpc, "vpc-1", KeyValue::new("team", "core"))
        .await
        .unwrap();
    rt.add_tag(
        CONN,
        ResourceKind::SecurityGroup,
        "sg-1",
        KeyValue::new("env", "prod"),
    )
    .await
    .unwrap();

    let tags = rt.list_tag(CONN, ResourceKind::Vpc, "vpc-1").await.unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(
        rt.get_tag(CONN, ResourceKind::Vpc, "vpc-1", "team").await.unwrap(),
        KeyValue::new("team", "core")
    );

    let found = rt.find_tag(CONN, ResourceKind::Vpc, "stag").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].resource_iid.name_id, "vpc-1");
    let found = rt
        .find_tag(CONN, ResourceKind::SecurityGroup, "")
        .await
        .unwrap();
    assert_eq!(found[0].resource_iid.name_id, "sg-1");

    assert!(
        rt.remove_tag(CONN, ResourceKind::Vpc, "vpc-1", "env")
            .await
            .unwrap()
    );
    assert!(
        rt.get_tag(CONN, ResourceKind::Vpc, "vpc-1", "env")
            .await
            .unwrap_err()
            .is_not_found()
    );

    // Tagging an unknown name fails on the record lookup
    let err = rt
        .add_tag(CONN, ResourceKind::Vpc, "vpc-9", KeyValue::new("env", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NotFound(_)));
}
