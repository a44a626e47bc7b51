use app_controller::crd::App;
use kube::core::CustomResourceExt;

fn main() {
    let crd = App::crd();
    let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
    println!("{}", yaml);
}
