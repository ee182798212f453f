use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, FnArg, GenericArgument, Ident,
    ItemFn, Pat, PathArguments, Signature, Token, Type,
};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// By default the server runs on a fresh in-memory store. Injectable
/// dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::repository::MemoryStore`.
///
/// With `#[backend_test(mongo)]` the server runs on a fresh MongoDB database
/// instead, which is dropped regardless of how the test terminates.
/// Injectable dependencies are then [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], and `crate::model::mongodb::Coll<T>`. These tests
/// need a running server and are ignored unless requested.
///
/// Adding `admin` signs the client in as the example administrator first.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let flags = parse_macro_input!(args with Punctuated::<Ident, Token![,]>::parse_terminated);

    let mut mongo = false;
    let mut admin = false;
    for flag in &flags {
        if flag == "mongo" {
            mongo = true;
        } else if flag == "admin" {
            admin = true;
        } else {
            return syn::Error::new(flag.span(), "Expected `mongo` and/or `admin`")
                .into_compile_error()
                .into();
        }
    }

    // Extract type information and reject invalid function signatures.
    let injected = match check_sig(item_fn.sig.clone(), mongo) {
        Ok(injected) => injected,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Register the example administrator and sign the client in.
    let maybe_login = if admin {
        quote! {
            crate::repository::AdminRepository::register(
                repositories.admins.as_ref(),
                crate::model::admin::NewAdmin::example(),
            )
            .await
            .unwrap();

            rocket_client
                .post(uri!(crate::api::admin::authenticate))
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::admin::AdminCredentials::example()).to_string())
                .dispatch()
                .await;
        }
    } else {
        quote! {}
    };

    if mongo {
        mongo_test(name, new_name, item_fn, injected, maybe_login)
    } else {
        memory_test(name, new_name, item_fn, injected, maybe_login)
    }
}

fn memory_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    injected: Injected,
    maybe_login: TokenStream2,
) -> TokenStream {
    let Injected { args, .. } = injected;
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::repository::MemoryStore) {
                let store = crate::repository::MemoryStore::default();
                let repositories = crate::repository::Repositories::memory(store.clone());
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_repositories(repositories.clone())
                )
                    .await
                    .unwrap();

                #maybe_login

                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store) = setup().await;
                #new_name(#(#args),*).await;
            });
        }
    }
    .into()
}

fn mongo_test(
    name: Ident,
    new_name: Ident,
    item_fn: ItemFn,
    injected: Injected,
    maybe_login: TokenStream2,
) -> TokenStream {
    let Injected {
        args,
        collection_idents,
        collection_types,
    } = injected;
    quote! {
        #[test]
        #[ignore = "requires a running MongoDB server"]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, mongodb::Database) {
                let db_client = crate::db_client().await;
                let db = crate::config::database_for(&db_client);
                let repositories = crate::repository::Repositories::mongo(&db);
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_repositories(repositories.clone())
                )
                    .await
                    .unwrap();

                #maybe_login

                (rocket_client, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#args),* #(,#collection_idents)*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Parameters to pass to the wrapped test, in order.
struct Injected {
    args: Vec<TokenStream2>,
    collection_idents: Vec<Ident>,
    collection_types: Vec<Ident>,
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, mongo: bool) -> Result<Injected, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut has_store = false;
    let mut injected = Injected {
        args: vec![],
        collection_idents: vec![],
        collection_types: vec![],
    };

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            injected.args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Database" && mongo {
                            if has_db {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `mongodb::Database`",
                                ));
                            }
                            has_db = true;
                            injected.args.push(quote! { db });
                            continue;
                        } else if type_ident == "MemoryStore" && !mongo {
                            if has_store {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `MemoryStore`",
                                ));
                            }
                            has_store = true;
                            injected.args.push(quote! { store });
                            continue;
                        }
                    } else if mongo {
                        // Valid as the last path segment for any type is itself
                        let possible_collection = type_path.path.segments.last().unwrap();
                        if possible_collection.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_collection.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        injected.collection_idents.push(pat_ident.ident.clone());
                                        injected.collection_types.push(type_ident.clone());
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let expected = if mongo {
            "Expected one of `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`"
        } else {
            "Expected one of `client_ident: Client` or `store_ident: MemoryStore`"
        };
        return Err(syn::Error::new(input.span(), expected));
    }

    Ok(injected)
}
