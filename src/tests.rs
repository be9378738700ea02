#![allow(dead_code)]

use crate::{
    create_injector, ConstructorSpec, FactoryDecl, FactoryLayer, FieldSpec,
    InjectError, Injector, Key, Module, Param, Provider, ServiceInfo, Svc,
    TypeRegistration,
};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

#[derive(Default)]
struct Ticket;

fn ticket_registration() -> TypeRegistration {
    TypeRegistration::of::<Ticket>()
        .with_constructor(ConstructorSpec::new([], |_| Ok(Ticket)))
}

struct GreetingModule;

impl Module for GreetingModule {
    fn name(&self) -> &'static str {
        "GreetingModule"
    }

    fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
        vec![vec![FactoryDecl::new("greeting", [], |_| {
            Ok(String::from("hello"))
        })]]
    }
}

struct LoudGreetingModule;

impl Module for LoudGreetingModule {
    fn name(&self) -> &'static str {
        "LoudGreetingModule"
    }

    fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
        let mut layers = vec![vec![FactoryDecl::new("greeting", [], |_| {
            Ok(String::from("HELLO"))
        })]];
        layers.extend(Arc::new(GreetingModule).factories());
        layers
    }
}

struct TrailModule;

impl Module for TrailModule {
    fn name(&self) -> &'static str {
        "TrailModule"
    }

    fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
        vec![vec![FactoryDecl::new("trail", [], |_| {
            Ok(String::from("audit-trail"))
        })
        .named("trail")]]
    }
}

#[test]
fn transient_resolutions_are_distinct_instances() {
    let mut builder = Injector::builder();
    builder.register(ticket_registration());
    let injector = builder.build().unwrap();

    let first: Svc<Ticket> = injector.get_instance().unwrap();
    let second: Svc<Ticket> = injector.get_instance().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn singleton_resolutions_share_one_instance() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&runs);

    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<Ticket>()
            .singleton()
            .with_constructor(ConstructorSpec::new([], move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Ticket)
            })),
    );
    let injector = builder.build().unwrap();

    let first: Svc<Ticket> = injector.get_instance().unwrap();
    let second: Svc<Ticket> = injector.get_instance().unwrap();
    let through_provider = injector.get_provider::<Ticket>().get().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &through_provider));
    assert_eq!(1, runs.load(Ordering::SeqCst));
}

#[test]
fn concurrent_singleton_resolutions_construct_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&runs);

    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<Ticket>()
            .singleton()
            .with_constructor(ConstructorSpec::new([], move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Ticket)
            })),
    );
    let injector = builder.build().unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let injector = injector.clone();
            scope.spawn(move || {
                let _ticket: Svc<Ticket> = injector.get_instance().unwrap();
            });
        }
    });

    assert_eq!(1, runs.load(Ordering::SeqCst));
}

#[test]
fn refining_module_overrides_base_factories() {
    let mut builder = Injector::builder();
    builder.add_module(LoudGreetingModule);
    let injector = builder.build().unwrap();

    let greeting: Svc<String> = injector.get_instance().unwrap();
    assert_eq!("HELLO", greeting.as_str());
}

#[test]
fn module_factories_take_precedence_over_constructors() {
    struct PortModule;
    impl Module for PortModule {
        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![FactoryDecl::new("port", [], |_| Ok(8080u16))]]
        }
    }

    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<u16>()
            .with_constructor(ConstructorSpec::new([], |_| Ok(80u16))),
    );
    builder.add_module(PortModule);
    let injector = builder.build().unwrap();

    let port: Svc<u16> = injector.get_instance().unwrap();
    assert_eq!(8080, *port);
}

#[test]
fn named_qualifiers_select_distinct_bindings() {
    struct UrlModule;
    impl Module for UrlModule {
        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![
                FactoryDecl::new("primary", [], |_| {
                    Ok(String::from("primary-db"))
                })
                .named("primary"),
                FactoryDecl::new("replica", [], |_| {
                    Ok(String::from("replica-db"))
                })
                .named("replica"),
            ]]
        }
    }

    let mut builder = Injector::builder();
    builder.add_module(UrlModule);
    let injector = builder.build().unwrap();

    let primary: Svc<String> = injector
        .get_instance_with(Key::named::<String>("primary"))
        .unwrap();
    let replica: Svc<String> = injector
        .get_instance_with(Key::named::<String>("replica"))
        .unwrap();
    assert_eq!("primary-db", primary.as_str());
    assert_eq!("replica-db", replica.as_str());

    // The unqualified key is a different key and stays unbound.
    match injector.get_instance::<String>() {
        Err(InjectError::NoBinding { key }) => {
            assert_eq!(Key::of::<String>(), key);
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn marker_qualifiers_select_distinct_bindings() {
    struct Primary;
    struct CacheModule;
    impl Module for CacheModule {
        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![
                FactoryDecl::new("size", [], |_| Ok(16usize)),
                FactoryDecl::new("primary_size", [], |_| Ok(64usize))
                    .qualified_by::<Primary>(),
            ]]
        }
    }

    let mut builder = Injector::builder();
    builder.add_module(CacheModule);
    let injector = builder.build().unwrap();

    let plain: Svc<usize> = injector.get_instance().unwrap();
    let primary: Svc<usize> = injector
        .get_instance_with(Key::qualified::<usize, Primary>())
        .unwrap();
    assert_eq!(16, *plain);
    assert_eq!(64, *primary);
}

#[test]
fn duplicate_factory_keys_fail_the_scan() {
    struct ClashingModule;
    impl Module for ClashingModule {
        fn name(&self) -> &'static str {
            "ClashingModule"
        }

        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![
                FactoryDecl::new("first", [], |_| Ok(1i32)),
                FactoryDecl::new("second", [], |_| Ok(2i32)),
            ]]
        }
    }

    let mut builder = Injector::builder();
    builder.add_module(ClashingModule);
    match builder.build() {
        Err(InjectError::DuplicateBinding { key, module }) => {
            assert_eq!(Key::of::<i32>(), key);
            assert_eq!("ClashingModule", module);
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn factory_parameters_resolve_through_the_injector() {
    struct ConnectionString(String);

    struct DbModule;
    impl Module for DbModule {
        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![
                FactoryDecl::new("host", [], |_| {
                    Ok(String::from("db.internal"))
                })
                .named("host"),
                FactoryDecl::new(
                    "connection",
                    [Param::of::<String>().named("host")],
                    |args| {
                        let host: Svc<String> = args.value()?;
                        Ok(ConnectionString(format!("postgres://{host}")))
                    },
                ),
            ]]
        }
    }

    let injector =
        create_injector([Arc::new(DbModule) as Arc<dyn Module>]).unwrap();
    let connection: Svc<ConnectionString> = injector.get_instance().unwrap();
    assert_eq!("postgres://db.internal", connection.0.as_str());
}

#[test]
fn cycles_are_reported_with_their_path() {
    struct Chicken(Svc<Egg>);
    struct Egg(Svc<Chicken>);

    let mut builder = Injector::builder();
    builder.register(TypeRegistration::of::<Chicken>().with_constructor(
        ConstructorSpec::new([Param::of::<Egg>()], |args| {
            Ok(Chicken(args.value()?))
        }),
    ));
    builder.register(TypeRegistration::of::<Egg>().with_constructor(
        ConstructorSpec::new([Param::of::<Chicken>()], |args| {
            Ok(Egg(args.value()?))
        }),
    ));
    let injector = builder.build().unwrap();

    match injector.get_instance::<Chicken>() {
        Err(InjectError::CircularDependency { chain, key }) => {
            assert_eq!(Key::of::<Chicken>(), key);
            assert_eq!(
                vec![Key::of::<Chicken>(), Key::of::<Egg>()],
                chain.keys().to_vec()
            );
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!("resolved a cyclic graph"),
    }
}

#[test]
fn provider_typed_dependencies_break_cycles() {
    struct Config {
        scheduler: Provider<Scheduler>,
    }
    struct Scheduler {
        config: Svc<Config>,
    }

    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<Config>()
            .singleton()
            .with_constructor(ConstructorSpec::new(
                [Param::provider_of::<Scheduler>()],
                |args| {
                    Ok(Config {
                        scheduler: args.provider()?,
                    })
                },
            )),
    );
    builder.register(TypeRegistration::of::<Scheduler>().with_constructor(
        ConstructorSpec::new([Param::of::<Config>()], |args| {
            Ok(Scheduler {
                config: args.value()?,
            })
        }),
    ));
    let injector = builder.build().unwrap();

    let config: Svc<Config> = injector.get_instance().unwrap();
    let scheduler = config.scheduler.get().unwrap();
    assert!(Arc::ptr_eq(&config, &scheduler.config));
}

#[test]
fn singletons_holding_deferred_handles_are_released_with_the_injector() {
    struct Dep;
    struct Watcher {
        dep: Provider<Dep>,
        released: Arc<AtomicBool>,
    }
    impl Drop for Watcher {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);

    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<Dep>()
            .with_constructor(ConstructorSpec::new([], |_| Ok(Dep))),
    );
    builder.register(
        TypeRegistration::of::<Watcher>()
            .singleton()
            .with_constructor(ConstructorSpec::new(
                [Param::provider_of::<Dep>()],
                move |args| {
                    Ok(Watcher {
                        dep: args.provider()?,
                        released: Arc::clone(&flag),
                    })
                },
            )),
    );
    let injector = builder.build().unwrap();

    let watcher: Svc<Watcher> = injector.get_instance().unwrap();
    assert!(watcher.dep.get().is_ok());

    // The cached singleton stores a deferred handle; the handle must not
    // keep the injector's state, and with it the singleton cache, alive.
    drop(watcher);
    drop(injector);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn provider_handles_outliving_the_injector_fail_to_resolve() {
    let mut builder = Injector::builder();
    builder.register(ticket_registration());
    let injector = builder.build().unwrap();

    let tickets = injector.get_provider::<Ticket>();
    assert!(tickets.get().is_ok());

    drop(injector);
    assert!(tickets.get().is_err());
}

#[test]
fn factory_failures_surface_as_instantiation_errors() {
    struct FlakyModule;
    impl Module for FlakyModule {
        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![FactoryDecl::new("value", [], |_| {
                Err::<i32, _>("the upstream is down".into())
            })]]
        }
    }

    let mut builder = Injector::builder();
    builder.add_module(FlakyModule);
    let injector = builder.build().unwrap();

    match injector.get_instance::<i32>() {
        Err(InjectError::Instantiation { key, cause }) => {
            assert_eq!(Key::of::<i32>(), key);
            assert!(cause.to_string().contains("the upstream is down"));
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn registered_type_without_constructor_cannot_be_requested() {
    struct FieldOnly;

    let mut builder = Injector::builder();
    builder.register(TypeRegistration::of::<FieldOnly>());
    let injector = builder.build().unwrap();

    match injector.get_instance::<FieldOnly>() {
        Err(InjectError::NoInjectableConstructor { key }) => {
            assert_eq!(Key::of::<FieldOnly>(), key);
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn two_registered_constructors_are_ambiguous() {
    let mut builder = Injector::builder();
    builder.register(
        TypeRegistration::of::<Ticket>()
            .with_constructor(ConstructorSpec::new([], |_| Ok(Ticket)))
            .with_constructor(ConstructorSpec::new([], |_| Ok(Ticket))),
    );
    let injector = builder.build().unwrap();

    match injector.get_instance::<Ticket>() {
        Err(InjectError::MultipleInjectConstructors { service }) => {
            assert_eq!(ServiceInfo::of::<Ticket>(), service);
        }
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }
}

#[test]
fn field_injection_fills_registered_fields() {
    #[derive(Default)]
    struct Handler {
        greeting: Option<Svc<String>>,
        tickets: Option<Provider<Ticket>>,
    }

    let mut builder = Injector::builder();
    builder.add_module(GreetingModule);
    builder.register(ticket_registration());
    builder.register(
        TypeRegistration::of::<Handler>()
            .with_field(FieldSpec::of::<String, Handler, _>(
                "greeting",
                |handler, args| {
                    handler.greeting = args.value().ok();
                    handler.greeting.is_some()
                },
            ))
            .with_field(FieldSpec::provider_of::<Ticket, Handler, _>(
                "tickets",
                |handler, args| {
                    handler.tickets = args.provider().ok();
                    handler.tickets.is_some()
                },
            )),
    );
    let injector = builder.build().unwrap();

    let mut handler = Handler::default();
    assert!(injector.inject_fields(&mut handler));
    assert_eq!("hello", handler.greeting.unwrap().as_str());
    assert!(handler.tickets.unwrap().get().is_ok());
}

#[test]
fn unresolvable_fields_are_skipped() {
    struct Missing;

    #[derive(Default)]
    struct Handler {
        greeting: Option<Svc<String>>,
        missing: Option<Svc<Missing>>,
    }

    let mut builder = Injector::builder();
    builder.add_module(GreetingModule);
    builder.register(
        TypeRegistration::of::<Handler>()
            .with_field(FieldSpec::of::<String, Handler, _>(
                "greeting",
                |handler, args| {
                    handler.greeting = args.value().ok();
                    handler.greeting.is_some()
                },
            ))
            .with_field(FieldSpec::of::<Missing, Handler, _>(
                "missing",
                |handler, args| {
                    handler.missing = args.value().ok();
                    handler.missing.is_some()
                },
            )),
    );
    let injector = builder.build().unwrap();

    let mut handler = Handler::default();
    assert!(!injector.inject_fields(&mut handler));
    assert!(handler.greeting.is_some());
    assert!(handler.missing.is_none());
}

#[test]
fn field_injection_walks_parent_registrations() {
    #[derive(Default)]
    struct BaseHandler {
        greeting: Option<Svc<String>>,
    }

    #[derive(Default)]
    struct AuditedHandler {
        base: BaseHandler,
        audit: Option<Svc<String>>,
    }

    let mut builder = Injector::builder();
    builder.add_module(GreetingModule);
    builder.add_module(TrailModule);
    builder.register(TypeRegistration::of::<BaseHandler>().with_field(
        FieldSpec::of::<String, BaseHandler, _>("greeting", |handler, args| {
            handler.greeting = args.value().ok();
            handler.greeting.is_some()
        }),
    ));
    builder.register(
        TypeRegistration::of::<AuditedHandler>()
            .extending(|handler: &mut AuditedHandler| &mut handler.base)
            .with_field(
                FieldSpec::of::<String, AuditedHandler, _>(
                    "audit",
                    |handler, args| {
                        handler.audit = args.value().ok();
                        handler.audit.is_some()
                    },
                )
                .named("trail"),
            ),
    );
    let injector = builder.build().unwrap();

    let mut handler = AuditedHandler::default();
    assert!(injector.inject_fields(&mut handler));
    assert_eq!("hello", handler.base.greeting.unwrap().as_str());
    assert_eq!("audit-trail", handler.audit.unwrap().as_str());
}

#[test]
fn modules_can_be_added_after_build() {
    let injector = Injector::builder().build().unwrap();
    let sibling = injector.clone();

    match injector.get_instance::<String>() {
        Err(InjectError::NoBinding { .. }) => {}
        Err(error) => Err(error).unwrap(),
        Ok(_) => unreachable!(),
    }

    injector.add_module(GreetingModule).unwrap();

    // The new binding is visible through every handle to the injector.
    let greeting: Svc<String> = sibling.get_instance().unwrap();
    assert_eq!("hello", greeting.as_str());

    // A second scan of the same factory collides with the live binding.
    match injector.add_module(GreetingModule) {
        Err(InjectError::DuplicateBinding { key, module }) => {
            assert_eq!(Key::of::<String>(), key);
            assert_eq!("GreetingModule", module);
        }
        Err(error) => Err(error).unwrap(),
        Ok(()) => unreachable!(),
    }
}

#[test]
fn added_module_collides_with_a_derived_binding() {
    struct TicketModule;
    impl Module for TicketModule {
        fn name(&self) -> &'static str {
            "TicketModule"
        }

        fn factories(self: Arc<Self>) -> Vec<FactoryLayer> {
            vec![vec![FactoryDecl::new("ticket", [], |_| Ok(Ticket))]]
        }
    }

    let mut builder = Injector::builder();
    builder.register(ticket_registration());
    let injector = builder.build().unwrap();

    // The first resolution derives a binding from the registered
    // constructor and installs it.
    let _ticket: Svc<Ticket> = injector.get_instance().unwrap();

    match injector.add_module(TicketModule) {
        Err(InjectError::DuplicateBinding { key, module }) => {
            assert_eq!(Key::of::<Ticket>(), key);
            assert_eq!("TicketModule", module);
        }
        Err(error) => Err(error).unwrap(),
        Ok(()) => unreachable!(),
    }
}

#[test]
fn create_injector_scans_all_modules() {
    let injector = create_injector([
        Arc::new(GreetingModule) as Arc<dyn Module>,
        Arc::new(TrailModule) as Arc<dyn Module>,
    ])
    .unwrap();

    let greeting: Svc<String> = injector.get_instance().unwrap();
    let trail: Svc<String> = injector
        .get_instance_with(Key::named::<String>("trail"))
        .unwrap();
    assert_eq!("hello", greeting.as_str());
    assert_eq!("audit-trail", trail.as_str());
}

#[test]
fn services_can_depend_on_the_injector() {
    struct LateBinder {
        injector: Svc<Injector>,
    }

    let mut builder = Injector::builder();
    builder.register(ticket_registration());
    builder.register(TypeRegistration::of::<LateBinder>().with_constructor(
        ConstructorSpec::new([Param::of::<Injector>()], |args| {
            Ok(LateBinder {
                injector: args.value()?,
            })
        }),
    ));
    let injector = builder.build().unwrap();

    let binder: Svc<LateBinder> = injector.get_instance().unwrap();
    let _ticket: Svc<Ticket> = binder.injector.get_instance().unwrap();
}
